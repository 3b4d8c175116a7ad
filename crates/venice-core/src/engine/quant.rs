use strum::{Display, EnumString};

/// How the checkpoint weights are stored in memory.
///
/// Each mode selects a different GGUF file of the same model; lower
/// precision trades some quality for a smaller footprint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Quantization {
    /// 4-bit k-quants (`Q4_K_M`). Lowest memory usage.
    #[default]
    #[strum(to_string = "4bit", serialize = "4-bit", serialize = "q4", serialize = "int4")]
    Q4,
    /// 8-bit round-to-nearest (`Q8_0`). Balanced.
    #[strum(to_string = "8bit", serialize = "8-bit", serialize = "q8", serialize = "int8")]
    Q8,
    /// Half-precision weights. Highest quality, most memory.
    #[strum(
        to_string = "full",
        serialize = "f16",
        serialize = "fp16",
        serialize = "bf16"
    )]
    Full,
}

impl Quantization {
    /// Human-readable summary used in startup logs.
    pub fn describe(self) -> &'static str {
        match self {
            Quantization::Q4 => "4-bit quantization (lowest memory usage)",
            Quantization::Q8 => "8-bit quantization (balanced)",
            Quantization::Full => "full precision (highest quality, most memory)",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn default_is_four_bit() {
        assert_eq!(Quantization::default(), Quantization::Q4);
    }

    #[test]
    fn parses_aliases_case_insensitively() {
        assert_eq!(Quantization::from_str("4bit").unwrap(), Quantization::Q4);
        assert_eq!(Quantization::from_str("4-BIT").unwrap(), Quantization::Q4);
        assert_eq!(Quantization::from_str("Q8").unwrap(), Quantization::Q8);
        assert_eq!(Quantization::from_str("8-bit").unwrap(), Quantization::Q8);
        assert_eq!(Quantization::from_str("bf16").unwrap(), Quantization::Full);
        assert_eq!(Quantization::from_str("full").unwrap(), Quantization::Full);
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Quantization::from_str("3bit").is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for q in [Quantization::Q4, Quantization::Q8, Quantization::Full] {
            assert_eq!(Quantization::from_str(&q.to_string()).unwrap(), q);
        }
    }
}
