use serde::{Deserialize, Deserializer};

use crate::PinType;

/// A single comparison clause gating a schedule's effect. Clause order is
/// meaningful: evaluation is sequential and stops at the first failure.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub port: String,
    pub pin_type: PinType,
    pub pin_number: u8,
    #[serde(deserialize_with = "sign_from_str")]
    pub sign: char,
    pub raw_value: i32,
}

// Signs other than `>`, `<` and `=` never veto a schedule; they are kept
// as-is rather than rejected at parse time.
fn sign_from_str<'de, D>(deserializer: D) -> Result<char, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.chars()
        .next()
        .ok_or_else(|| serde::de::Error::custom("empty comparison sign"))
}

/// A conditional scheduled action fetched from the control service. The
/// guarded pin receives `true_value` when every condition holds, otherwise
/// `false_value`.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub id: u32,
    pub port: String,
    pub pin_type: PinType,
    pub pin_number: u8,
    pub true_value: i32,
    pub false_value: i32,
    pub conditions: Vec<Condition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_parses_from_a_document() {
        let cond: Condition = serde_json::from_str(
            r#"{ "port": "/dev/ttyACM1", "pinType": "A", "pinNumber": 3,
                 "sign": ">", "rawValue": 500 }"#,
        )
        .unwrap();
        assert_eq!(cond.port, "/dev/ttyACM1");
        assert_eq!(cond.pin_type, PinType::Analogue);
        assert_eq!(cond.pin_number, 3);
        assert_eq!(cond.sign, '>');
        assert_eq!(cond.raw_value, 500);
    }

    #[test]
    fn unknown_signs_are_kept_verbatim() {
        let cond: Condition = serde_json::from_str(
            r#"{ "port": "p", "pinType": "D", "pinNumber": 1,
                 "sign": "!", "rawValue": 0 }"#,
        )
        .unwrap();
        assert_eq!(cond.sign, '!');
    }

    #[test]
    fn empty_sign_is_rejected() {
        let res: Result<Condition, _> = serde_json::from_str(
            r#"{ "port": "p", "pinType": "D", "pinNumber": 1,
                 "sign": "", "rawValue": 0 }"#,
        );
        assert!(res.is_err());
    }
}
