//! 话语解析："Felix -> Daniel: text" 形式为人与人之间的对话；没有箭头的输入视为 User 对机器人的直接指令

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// 直接指令的默认说话人
pub const DIRECT_SPEAKER: &str = "User";

static ARROW_RE: OnceLock<Regex> = OnceLock::new();

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Utterance {
    pub speaker: String,
    /// None：对机器人说（或对所有人）
    pub addressee: Option<String>,
    pub text: String,
}

impl Utterance {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let re = ARROW_RE.get_or_init(|| {
            Regex::new(r"^\s*([^:>\-]+?)\s*->\s*([^:]+?)\s*:\s*(.*)$").expect("static utterance pattern")
        });
        match re.captures(line) {
            Some(caps) => Self {
                speaker: caps[1].to_string(),
                addressee: Some(caps[2].to_string()),
                text: caps[3].trim().to_string(),
            },
            None => Self {
                speaker: DIRECT_SPEAKER.to_string(),
                addressee: None,
                text: line.to_string(),
            },
        }
    }

    pub fn is_direct(&self) -> bool {
        self.addressee.is_none()
    }
}

impl fmt::Display for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.addressee {
            Some(to) => write!(f, "{} -> {}: {}", self.speaker, to, self.text),
            None => write!(f, "{}: {}", self.speaker, self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_overheard() {
        let u = Utterance::parse("Felix -> Daniel: Hey Daniel, what do we have to drink?");
        assert_eq!(u.speaker, "Felix");
        assert_eq!(u.addressee.as_deref(), Some("Daniel"));
        assert_eq!(u.text, "Hey Daniel, what do we have to drink?");
        assert_eq!(u.to_string(), "Felix -> Daniel: Hey Daniel, what do we have to drink?");
    }

    #[test]
    fn test_parse_direct_command() {
        let u = Utterance::parse("  pour some cola into the glass ");
        assert!(u.is_direct());
        assert_eq!(u.speaker, DIRECT_SPEAKER);
        assert_eq!(u.text, "pour some cola into the glass");
    }

    #[test]
    fn test_text_may_contain_colons() {
        let u = Utterance::parse("Daniel -> All: note: the glass is empty");
        assert_eq!(u.addressee.as_deref(), Some("All"));
        assert_eq!(u.text, "note: the glass is empty");
    }
}
