//! Prompt Builder
//!
//! Standardized prompt construction for every model call in the pipeline.
//!
//! Sections render in insertion order:
//!
//! 1. **Role**: expert persona and specialty
//! 2. **Objectives**: numbered goals
//! 3. **Context**: labelled input values
//! 4. **Text / Code**: raw material such as the requirements document
//! 5. **Focus**: hard restrictions
//! 6. **Output format**: the reply shape the parser expects

/// Prompt section types
#[derive(Debug, Clone)]
pub enum PromptSection {
    /// Role definition with expertise area
    Role { expertise: String, task: String },
    /// Numbered objectives
    Objectives(Vec<String>),
    /// Ordered key-value pairs
    Context(Vec<(String, String)>),
    /// Raw text section with optional header
    Text {
        header: Option<String>,
        content: String,
    },
    /// Code block with language
    Code { language: String, content: String },
    /// Focus enforcement with restrictions
    Focus {
        target: String,
        restrictions: Vec<String>,
    },
    /// Expected reply shape
    OutputFormat(String),
}

/// Prompt builder for consistent prompt construction
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    sections: Vec<PromptSection>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a role definition section
    pub fn role(mut self, expertise: &str, task: &str) -> Self {
        self.sections.push(PromptSection::Role {
            expertise: expertise.to_string(),
            task: task.to_string(),
        });
        self
    }

    /// Add objectives section
    pub fn objectives(mut self, objectives: Vec<&str>) -> Self {
        self.sections.push(PromptSection::Objectives(
            objectives.into_iter().map(String::from).collect(),
        ));
        self
    }

    /// Add a context item, appended to the first context section
    pub fn context_item(mut self, key: &str, value: &str) -> Self {
        let entry = (key.to_string(), value.to_string());
        match self.sections.iter_mut().find_map(|section| match section {
            PromptSection::Context(items) => Some(items),
            _ => None,
        }) {
            Some(items) => items.push(entry),
            None => self.sections.push(PromptSection::Context(vec![entry])),
        }
        self
    }

    /// Add text section
    pub fn text(mut self, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: None,
            content: content.to_string(),
        });
        self
    }

    /// Add text section with header
    pub fn section(mut self, header: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Text {
            header: Some(header.to_string()),
            content: content.to_string(),
        });
        self
    }

    /// Add code block
    pub fn code(mut self, language: &str, content: &str) -> Self {
        self.sections.push(PromptSection::Code {
            language: language.to_string(),
            content: content.to_string(),
        });
        self
    }

    /// Add focus enforcement section
    pub fn focus(mut self, target: &str, restrictions: Vec<&str>) -> Self {
        self.sections.push(PromptSection::Focus {
            target: target.to_string(),
            restrictions: restrictions.into_iter().map(String::from).collect(),
        });
        self
    }

    /// Describe the reply format
    pub fn output_format(mut self, content: &str) -> Self {
        self.sections
            .push(PromptSection::OutputFormat(content.to_string()));
        self
    }

    /// Build the final prompt string
    pub fn build(self) -> String {
        let mut prompt = String::new();

        for section in self.sections {
            match section {
                PromptSection::Role { expertise, task } => {
                    prompt.push_str("<ROLE>\n");
                    prompt.push_str(&format!(
                        "You are an expert {} specializing in {}.\n",
                        expertise, task
                    ));
                    prompt.push_str("</ROLE>\n\n");
                }
                PromptSection::Objectives(objectives) => {
                    prompt.push_str("<OBJECTIVES>\n");
                    for (i, obj) in objectives.iter().enumerate() {
                        prompt.push_str(&format!("{}. {}\n", i + 1, obj));
                    }
                    prompt.push_str("</OBJECTIVES>\n\n");
                }
                PromptSection::Context(items) => {
                    prompt.push_str("# Context\n\n");
                    for (key, value) in items {
                        prompt.push_str(&format!("**{}**: {}\n", key, value));
                    }
                    prompt.push('\n');
                }
                PromptSection::Text { header, content } => {
                    if let Some(h) = header {
                        prompt.push_str(&format!("# {}\n\n", h));
                    }
                    prompt.push_str(&content);
                    prompt.push_str("\n\n");
                }
                PromptSection::Code { language, content } => {
                    prompt.push_str(&format!("```{}\n", language));
                    prompt.push_str(&content);
                    prompt.push_str("\n```\n\n");
                }
                PromptSection::Focus {
                    target,
                    restrictions,
                } => {
                    prompt.push_str("<FOCUS>\n");
                    prompt.push_str(&format!("IMPORTANT: Focus EXCLUSIVELY on: {}\n", target));
                    for restriction in restrictions {
                        prompt.push_str(&format!("- {}\n", restriction));
                    }
                    prompt.push_str("</FOCUS>\n\n");
                }
                PromptSection::OutputFormat(content) => {
                    prompt.push_str("<OUTPUT_FORMAT>\n");
                    prompt.push_str(&content);
                    prompt.push_str("\n</OUTPUT_FORMAT>\n\n");
                }
            }
        }

        prompt.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_prompt() {
        let prompt = PromptBuilder::new()
            .role("API designer", "REST interfaces")
            .objectives(vec!["List endpoints", "Name parameters"])
            .build();

        assert!(prompt.contains("<ROLE>"));
        assert!(prompt.contains("You are an expert API designer specializing in REST interfaces."));
        assert!(prompt.contains("1. List endpoints"));
        assert!(prompt.contains("2. Name parameters"));
    }

    #[test]
    fn test_context_items_keep_order() {
        let prompt = PromptBuilder::new()
            .context_item("Project", "inventory")
            .section("Notes", "free text")
            .context_item("Framework", "FastAPI")
            .build();

        let project = prompt.find("**Project**: inventory").unwrap();
        let framework = prompt.find("**Framework**: FastAPI").unwrap();
        assert!(project < framework);
        assert!(framework < prompt.find("# Notes").unwrap());
        assert_eq!(prompt.matches("# Context").count(), 1);
    }

    #[test]
    fn test_focus_code_and_output_format() {
        let prompt = PromptBuilder::new()
            .focus("database models", vec!["Do NOT invent tables"])
            .code("json", "{\"users\": []}")
            .output_format("A single fenced json block")
            .build();

        assert!(prompt.contains("IMPORTANT: Focus EXCLUSIVELY on: database models"));
        assert!(prompt.contains("- Do NOT invent tables"));
        assert!(prompt.contains("```json\n{\"users\": []}\n```"));
        assert!(prompt.ends_with("</OUTPUT_FORMAT>"));
    }
}
