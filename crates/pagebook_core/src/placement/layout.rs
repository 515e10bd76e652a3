//! Mapping between page indices and page container paths.

use crate::config::ConfigError;
use crate::model::record::PageIndex;
use crate::scene::path::ContainerPath;
use regex::Regex;

/// Page container naming scheme, e.g. `Canvas/pages/page{n}/cards{n}`.
#[derive(Debug, Clone)]
pub struct PageLayout {
    template: String,
    offset: u32,
    pattern: Regex,
}

impl PageLayout {
    pub const PLACEHOLDER: &'static str = "{n}";

    /// Builds a layout where `{n}` stands for `page index + offset`.
    pub fn new(template: &str, offset: u32) -> Result<Self, ConfigError> {
        let template = template.trim().trim_matches('/');
        if !template.contains(Self::PLACEHOLDER) {
            return Err(ConfigError::InvalidTemplate(template.to_string()));
        }
        let escaped_placeholder = regex::escape(Self::PLACEHOLDER);
        let source = format!(
            "^{}$",
            regex::escape(template).replace(&escaped_placeholder, r"(\d+)")
        );
        let pattern =
            Regex::new(&source).map_err(|_| ConfigError::InvalidTemplate(template.to_string()))?;
        Ok(Self {
            template: template.to_string(),
            offset,
            pattern,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Card container path of `page`.
    pub fn container_path(&self, page: PageIndex) -> ContainerPath {
        let number = u64::from(page) + u64::from(self.offset);
        ContainerPath::parse(&self.template.replace(Self::PLACEHOLDER, &number.to_string()))
    }

    /// Page whose card container is exactly `path`, if any.
    pub fn page_for_path(&self, path: &ContainerPath) -> Option<PageIndex> {
        let captures = self.pattern.captures(path.as_str())?;
        let mut numbers = captures
            .iter()
            .skip(1)
            .flatten()
            .map(|group| group.as_str().parse::<u64>().ok());
        let first = numbers.next()??;
        if !numbers.all(|number| number == Some(first)) {
            return None;
        }
        first
            .checked_sub(u64::from(self.offset))
            .and_then(|page| PageIndex::try_from(page).ok())
    }
}
