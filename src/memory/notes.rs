//! 决策内笔记：本次话语、已执行调用的结果、被拒绝或失败的调用
//!
//! 每次决策开始时重置，作为 system prompt 的最后一段交给推理服务。

#[derive(Clone, Debug, Default)]
pub struct DecisionNotes {
    utterance: Option<String>,
    tried: Vec<String>,
    failed: Vec<String>,
}

impl DecisionNotes {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开始新的决策：丢弃上一条话语的全部笔记
    pub fn begin(&mut self, utterance: impl Into<String>) {
        self.clear();
        self.utterance = Some(utterance.into());
    }

    /// "tool(args) -> observation"
    pub fn tried(&mut self, entry: impl Into<String>) {
        self.tried.push(entry.into());
    }

    pub fn failed(&mut self, entry: impl Into<String>) {
        self.failed.push(entry.into());
    }

    pub fn utterance(&self) -> Option<&str> {
        self.utterance.as_deref()
    }

    pub fn failures(&self) -> &[String] {
        &self.failed
    }

    pub fn clear(&mut self) {
        self.utterance = None;
        self.tried.clear();
        self.failed.clear();
    }

    pub fn render(&self) -> String {
        let Some(utterance) = &self.utterance else {
            return String::new();
        };
        let mut out = format!("## Current utterance\n{utterance}\n");
        for (title, entries) in [("What has been tried", &self.tried), ("Failures", &self.failed)] {
            if entries.is_empty() {
                continue;
            }
            out.push_str(&format!("\n## {title}\n"));
            for entry in entries {
                out.push_str("- ");
                out.push_str(entry);
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_sections() {
        let mut notes = DecisionNotes::new();
        assert!(notes.render().is_empty());

        notes.begin("Felix -> Daniel: please hand me the red glass");
        notes.tried("check_hindering_reasons(...) -> Daniel cannot reach red_glass.");
        notes.failed("hand_object_over_to_person: unknown parameter 'speed'");
        let section = notes.render();
        assert!(section.starts_with("## Current utterance\nFelix -> Daniel"));
        assert!(section.contains("## What has been tried\n- check_hindering_reasons"));
        assert!(section.contains("## Failures\n- hand_object_over_to_person"));

        notes.begin("User: stop");
        assert!(notes.failures().is_empty());
        assert!(!notes.render().contains("Failures"));
    }
}
