//! 描述文本同义词替换
//!
//! 每条广告发布前对描述中的常见词做随机替换，避免多条广告内容完全重复。

use phf::phf_map;
use rand::seq::IndexedRandom;
use rand::Rng;

/// 默认替换概率
pub const DEFAULT_SPIN_PROBABILITY: f64 = 0.3;

static SYNONYMS: phf::Map<&'static str, &'static [&'static str]> = phf_map! {
    "excelente" => &["bueno", "óptimo", "magnífico"],
    "precio" => &["costo", "valor", "importe"],
    "producto" => &["artículo", "item", "mercancía"],
    "venta" => &["oferta", "oportunidad"],
    "nuevo" => &["flamante", "reciente"],
    "usado" => &["seminuevo", "de segunda mano"],
};

#[derive(Debug, Clone, Copy)]
pub struct TextSpinner {
    probability: f64,
}

impl Default for TextSpinner {
    fn default() -> Self {
        Self::new(DEFAULT_SPIN_PROBABILITY)
    }
}

impl TextSpinner {
    pub fn new(probability: f64) -> Self {
        Self {
            probability: probability.clamp(0.0, 1.0),
        }
    }

    /// 按词替换，保留首字母大写和词尾标点；空白统一为单个空格
    pub fn spin(&self, text: &str) -> String {
        if text.trim().is_empty() || self.probability <= 0.0 {
            return text.to_string();
        }

        let mut rng = rand::rng();
        text.split_whitespace()
            .map(|word| {
                let core = word.trim_end_matches(|c: char| ".,!?;:".contains(c));
                let tail = &word[core.len()..];
                let Some(choices) = SYNONYMS.get(core.to_lowercase().as_str()) else {
                    return word.to_string();
                };
                if !rng.random_bool(self.probability) {
                    return word.to_string();
                }
                match choices.choose(&mut rng) {
                    Some(replacement) => {
                        let starts_upper = core.chars().next().is_some_and(char::is_uppercase);
                        let replacement = if starts_upper {
                            capitalize(replacement)
                        } else {
                            replacement.to_string()
                        };
                        format!("{}{}", replacement, tail)
                    }
                    None => word.to_string(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
