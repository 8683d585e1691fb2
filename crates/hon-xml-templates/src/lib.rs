use std::collections::HashMap;

/// Template names the renderer looks up.
pub const PAGE_TEMPLATE_NAME: &str = "page.xhtml";
pub const CHAPTER_TEMPLATE_NAME: &str = "chapter.xhtml";
pub const XSLT_TEMPLATE_NAME: &str = "hon.xslt";

pub const PAGE_TEMPLATE: &str = include_str!("../templates/page.xhtml");
pub const CHAPTER_TEMPLATE: &str = include_str!("../templates/chapter.xhtml");
pub const XSLT_TEMPLATE: &str = include_str!("../templates/hon.xslt");

#[must_use]
pub fn all_templates() -> HashMap<&'static str, &'static str> {
  let mut templates = HashMap::new();
  templates.insert(PAGE_TEMPLATE_NAME, PAGE_TEMPLATE);
  templates.insert(CHAPTER_TEMPLATE_NAME, CHAPTER_TEMPLATE);
  templates.insert(XSLT_TEMPLATE_NAME, XSLT_TEMPLATE);
  templates
}
