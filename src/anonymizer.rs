//! Replaces the source's partially masked reviewer labels with stable pseudonyms.
//!
//! A label such as `ja****` keeps a one or two character prefix. That prefix is
//! looked up in a fixed table; prefixes missing from the table are hashed into a
//! bounded pool. The mapping is a pure function of the prefix and the seed, so
//! re-running over the same page always yields the same names.

use crate::config::AnonymizerConfig;

pub const ANONYMOUS: &str = "Anonymous";

const MASK_CHARS: &[char] = &['*', '＊', '•', '●', '·', '∙'];

/// Two-character keys are consulted before single-character ones.
const PREFIX_TABLE: &[(&str, &str)] = &[
    ("ja", "Jasmine"),
    ("je", "Jennifer"),
    ("jo", "Joanna"),
    ("ju", "Julia"),
    ("ka", "Katherine"),
    ("ki", "Kimberly"),
    ("ma", "Madison"),
    ("mi", "Michelle"),
    ("sa", "Samantha"),
    ("so", "Sophia"),
    ("a", "Amelia"),
    ("b", "Bella"),
    ("c", "Chloe"),
    ("d", "Daisy"),
    ("e", "Emma"),
    ("f", "Fiona"),
    ("g", "Grace"),
    ("h", "Hannah"),
    ("i", "Isla"),
    ("j", "Jessica"),
    ("k", "Kylie"),
    ("l", "Lily"),
    ("m", "Mia"),
    ("n", "Nora"),
    ("o", "Olivia"),
    ("p", "Paige"),
    ("q", "Quinn"),
    ("r", "Ruby"),
    ("s", "Sarah"),
    ("t", "Taylor"),
    ("u", "Uma"),
    ("v", "Violet"),
    ("w", "Willow"),
    ("x", "Ximena"),
    ("y", "Yasmin"),
    ("z", "Zoe"),
];

pub const DEFAULT_POOL: &[&str] = &[
    "Aria", "Brooke", "Camille", "Delia", "Elena", "Freya", "Gemma", "Harper", "Ivy", "Juno",
    "Kara", "Leah", "Maya", "Nina", "Opal", "Piper", "Rose", "Stella", "Tessa", "Vera",
];

pub struct Anonymizer {
    seed: u64,
    pool: Vec<String>,
}

impl Anonymizer {
    pub fn new(config: &AnonymizerConfig) -> Self {
        Self {
            seed: config.seed,
            pool: config.pool.clone(),
        }
    }

    pub fn anonymize(&self, label: &str) -> String {
        let visible: String = label
            .chars()
            .filter(|c| !MASK_CHARS.contains(c) && !c.is_whitespace())
            .collect();

        let prefix: String = visible.chars().take(2).flat_map(char::to_lowercase).collect();
        if prefix.is_empty() {
            return ANONYMOUS.to_string();
        }

        if let Some(name) = lookup(&prefix) {
            return name.to_string();
        }

        if self.pool.is_empty() {
            return ANONYMOUS.to_string();
        }
        let index = (fnv1a(self.seed, &prefix) % self.pool.len() as u64) as usize;
        self.pool[index].clone()
    }
}

impl Default for Anonymizer {
    fn default() -> Self {
        Self::new(&AnonymizerConfig::default())
    }
}

fn lookup(prefix: &str) -> Option<&'static str> {
    let two: String = prefix.chars().take(2).collect();
    let one: String = prefix.chars().take(1).collect();
    [two, one].iter().find_map(|key| {
        PREFIX_TABLE
            .iter()
            .find(|(k, _)| *k == key.as_str())
            .map(|(_, name)| *name)
    })
}

/// FNV-1a; stable across platforms and compiler versions, unlike `DefaultHasher`.
fn fnv1a(seed: u64, text: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET ^ seed;
    for byte in text.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
