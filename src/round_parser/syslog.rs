// Classifies syslog lines into the configured error categories

use regex::Regex;
use std::collections::BTreeMap;

use crate::config::SyslogConfig;

#[derive(Debug, Clone)]
pub struct SyslogClassifier {
    categories: Vec<(String, Vec<Regex>)>,
}

impl SyslogClassifier {
    pub fn new(config: &SyslogConfig) -> Result<Self, regex::Error> {
        let categories = config
            .categories
            .iter()
            .map(|c| {
                let patterns = c
                    .patterns
                    .iter()
                    .map(|p| Regex::new(p))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((c.name.clone(), patterns))
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { categories })
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|(name, _)| name.as_str())
    }

    /// Line count per category. Every category is present, zero when nothing matched.
    /// A line counts towards the first category with a matching pattern only.
    pub fn classify(&self, text: &str) -> BTreeMap<String, u64> {
        let mut counts: BTreeMap<String, u64> = self
            .category_names()
            .map(|name| (name.to_string(), 0))
            .collect();
        for line in text.lines() {
            let hit = self
                .categories
                .iter()
                .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(line)));
            if let Some((name, _)) = hit
                && let Some(count) = counts.get_mut(name)
            {
                *count += 1;
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyslogCategory;

    fn config() -> SyslogConfig {
        SyslogConfig {
            categories: vec![
                SyslogCategory {
                    name: "oom".into(),
                    description: String::new(),
                    patterns: vec!["Out of memory".into()],
                },
                SyslogCategory {
                    name: "kernel".into(),
                    description: String::new(),
                    patterns: vec!["kernel:".into()],
                },
            ],
        }
    }

    #[test]
    fn first_matching_category_wins() {
        let classifier = SyslogClassifier::new(&config()).unwrap();
        let counts = classifier.classify(
            "Jan 1 kernel: Out of memory: Kill process 42\nJan 1 kernel: usb 1-1: new device\nJan 1 app: hello\n",
        );
        assert_eq!(counts["oom"], 1);
        assert_eq!(counts["kernel"], 1);
    }

    #[test]
    fn empty_log_yields_zero_counts() {
        let classifier = SyslogClassifier::new(&config()).unwrap();
        let counts = classifier.classify("");
        assert_eq!(counts.len(), 2);
        assert!(counts.values().all(|&c| c == 0));
    }
}
