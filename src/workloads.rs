//! Built-in workload bodies.
//!
//! These are CPU-burning approximations of real tasks (dictionary coding,
//! grid search, document building, filters), not faithful implementations.
//! Each returns the work units one call represents, in the unit its registry
//! entry declares. All randomness is drawn from [`crate::ambient`].

use std::collections::HashMap;
use std::hint::black_box;

use serde::{Deserialize, Serialize};

use crate::ambient;
use crate::error::WorkloadError;

type Units = Result<f64, WorkloadError>;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

fn random_text(len: usize) -> Vec<u8> {
    (0..len)
        .map(|_| ALPHANUMERIC[ambient::below(ALPHANUMERIC.len())])
        .collect()
}

/// LZW-style dictionary coding of 10 000 random characters. Returns bytes processed.
pub fn compression() -> Units {
    let data = random_text(10_000);
    let mut dict: HashMap<Vec<u8>, u32> = HashMap::new();
    let mut out: Vec<u32> = Vec::with_capacity(data.len());
    let mut next_code = 256u32;
    let mut phrase = vec![data[0]];

    for &c in &data[1..] {
        let mut candidate = phrase.clone();
        candidate.push(c);
        if dict.contains_key(&candidate) {
            phrase = candidate;
        } else {
            out.push(code_for(&dict, &phrase));
            dict.insert(candidate, next_code);
            next_code += 1;
            phrase = vec![c];
        }
    }
    out.push(code_for(&dict, &phrase));
    black_box(&out);

    Ok(data.len() as f64)
}

fn code_for(dict: &HashMap<Vec<u8>, u32>, phrase: &[u8]) -> u32 {
    if phrase.len() > 1 {
        dict.get(phrase).copied().unwrap_or_default()
    } else {
        u32::from(phrase[0])
    }
}

/// Bounded node expansion over a 20x20 grid with random walls. One route per call.
pub fn navigation() -> Units {
    const SIZE: i64 = 20;
    let cells = (SIZE * SIZE) as usize;
    let mut grid = vec![false; cells];
    for _ in 0..50 {
        grid[ambient::below(cells)] = true;
    }

    let mut open = vec![0i64];
    let mut expanded = 0u32;
    for _ in 0..500 {
        let Some(current) = open.pop() else { break };
        expanded += 1;
        for offset in [1, -1, SIZE, -SIZE] {
            let neighbor = current + offset;
            if (0..cells as i64).contains(&neighbor) && !grid[neighbor as usize] {
                open.push(neighbor);
            }
        }
    }
    black_box(expanded);

    Ok(1.0)
}

#[derive(Debug)]
struct Element {
    tag: &'static str,
    text: String,
    children: Vec<Element>,
}

/// Builds a 500-paragraph element tree. One page per call.
pub fn html5() -> Units {
    let mut root = Element {
        tag: "div",
        text: String::new(),
        children: Vec::with_capacity(500),
    };
    for i in 0..500 {
        root.children.push(Element {
            tag: "p",
            text: format!("Test line {i}"),
            children: Vec::new(),
        });
    }
    let text_len: usize = root.children.iter().map(|c| c.text.len()).sum();
    black_box((root.tag, text_len));

    Ok(1.0)
}

/// Flattens 100 random cubic curves on an 800x600 page. Returns Mpixels (0.48).
pub fn pdf() -> Units {
    const WIDTH: f64 = 800.0;
    const HEIGHT: f64 = 600.0;
    const STEPS: usize = 16;

    let mut path_len = 0.0f64;
    for _ in 0..100 {
        let pts: [(f64, f64); 4] =
            std::array::from_fn(|_| (ambient::random() * WIDTH, ambient::random() * HEIGHT));
        let mut prev = pts[0];
        for step in 1..=STEPS {
            let t = step as f64 / STEPS as f64;
            let u = 1.0 - t;
            let x = u * u * u * pts[0].0
                + 3.0 * u * u * t * pts[1].0
                + 3.0 * u * t * t * pts[2].0
                + t * t * t * pts[3].0;
            let y = u * u * u * pts[0].1
                + 3.0 * u * u * t * pts[1].1
                + 3.0 * u * t * t * pts[2].1
                + t * t * t * pts[3].1;
            path_len += ((x - prev.0).powi(2) + (y - prev.1).powi(2)).sqrt();
            prev = (x, y);
        }
    }
    black_box(path_len);

    Ok(WIDTH * HEIGHT / 1_000_000.0)
}

/// Contrast adjustment over a random 512x512 RGBA image. One image per call.
pub fn photo() -> Units {
    const SIZE: usize = 512;
    let mut data: Vec<u8> = (0..SIZE * SIZE * 4)
        .map(|_| (ambient::random() * 255.0) as u8)
        .collect();

    let factor = (259.0 * (128.0 + 255.0)) / (255.0 * (259.0 - 128.0));
    for px in data.chunks_exact_mut(4) {
        for channel in &mut px[..3] {
            let v = factor * (f64::from(*channel) - 128.0) + 128.0;
            *channel = v.clamp(0.0, 255.0) as u8;
        }
    }
    black_box(&data);

    Ok(1.0)
}

const C_SNIPPET: &str = r#"
        int main() {
            int a = 0;
            for(int i=0; i<100; i++) {
                a += i;
                printf("Hello %d", a);
            }
            return 0;
        }
    "#;

/// Tokenizes 100 copies of a small C function. Returns thousands of tokens.
pub fn clang() -> Units {
    let source = C_SNIPPET.repeat(100);
    let tokens = tokenize(&source);
    Ok(tokens as f64 / 1000.0)
}

/// Counts word tokens and `{}();=` punctuators.
fn tokenize(source: &str) -> usize {
    let mut count = 0;
    let mut in_word = false;
    for c in source.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if !in_word {
                count += 1;
                in_word = true;
            }
            continue;
        }
        in_word = false;
        if matches!(c, '{' | '}' | '(' | ')' | ';' | '=') {
            count += 1;
        }
    }
    count
}

/// Replace, split and join over 50 000 random characters. One page per call.
pub fn text() -> Units {
    let raw = random_text(50_000);
    let text: String = raw.into_iter().map(char::from).collect();
    let processed = text.replace('a', "b").replace('1', "2");
    let joined = processed.split('b').collect::<Vec<_>>().join("c");
    black_box(joined.len());

    Ok(1.0)
}

#[derive(Debug, Serialize, Deserialize)]
struct Asset {
    id: u32,
    name: String,
    data: [f64; 2],
}

/// JSON round-trip of 1000 small records. Returns MB serialized.
pub fn asset() -> Units {
    let assets: Vec<Asset> = (0..1000)
        .map(|id| Asset {
            id,
            name: format!("Asset {id}"),
            data: [ambient::random(), ambient::random()],
        })
        .collect();

    let encoded = serde_json::to_string(&assets).map_err(|e| WorkloadError::new(e.to_string()))?;
    let decoded: Vec<Asset> =
        serde_json::from_str(&encoded).map_err(|e| WorkloadError::new(e.to_string()))?;
    black_box(decoded.len());

    Ok(encoded.len() as f64 / 1024.0 / 1024.0)
}

/// 3x3 Laplacian convolution over a 128x128 frame. One image per call.
pub fn object_detection() -> Units {
    const SIZE: usize = 128;
    const KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];
    let input = vec![0.0f32; SIZE * SIZE];
    let mut output = vec![0.0f32; SIZE * SIZE];

    for y in 1..SIZE - 1 {
        for x in 1..SIZE - 1 {
            let mut sum = 0.0f32;
            for ky in 0..3 {
                for kx in 0..3 {
                    sum += input[(y + ky - 1) * SIZE + (x + kx - 1)] * KERNEL[ky * 3 + kx];
                }
            }
            output[y * SIZE + x] = sum;
        }
    }
    black_box(&output);

    Ok(1.0)
}

/// 5x5 box blur over a 256x256 frame. One image per call.
pub fn blur() -> Units {
    const SIZE: usize = 256;
    let input = vec![0u8; SIZE * SIZE];
    let mut output = vec![0u8; SIZE * SIZE];

    for y in 2..SIZE - 2 {
        for x in 2..SIZE - 2 {
            let mut sum = 0u32;
            for ky in y - 2..=y + 2 {
                for kx in x - 2..=x + 2 {
                    sum += u32::from(input[ky * SIZE + kx]);
                }
            }
            output[y * SIZE + x] = (sum / 25) as u8;
        }
    }
    black_box(&output);

    Ok(1.0)
}

/// Gradient pass over a 256x256 frame. Returns Mpixels.
pub fn horizon() -> Units {
    const SIZE: usize = 256;
    let input = vec![0u8; SIZE * SIZE];
    let sum: u64 = input.iter().map(|&v| u64::from(v) * 2).sum();
    black_box(sum);

    Ok((SIZE * SIZE) as f64 / 1_000_000.0)
}

/// Iterative neighbour averaging over a 128x128 mask. One image per call.
pub fn remover() -> Units {
    const SIZE: usize = 128;
    let mut data = vec![0u8; SIZE * SIZE];
    for _ in 0..5 {
        for i in 1..data.len() - 1 {
            data[i] = ((u16::from(data[i - 1]) + u16::from(data[i + 1])) / 2) as u8;
        }
    }
    black_box(&data);

    Ok(1.0)
}
