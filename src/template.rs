use std::path::Path;

use minijinja::{context, path_loader, Environment};

use crate::error::Result;

/// Template files are `<name>.st` inside the template directory.
pub const EXTENSION: &str = ".st";

/// Variables available to a message body template.
#[derive(Debug, Clone, Copy)]
pub struct TemplateContext<'a> {
    pub sender_name: &'a str,
    pub recipient_name: &'a str,
}

/// Renders a named body template. Must not have side effects.
pub trait Renderer {
    fn render(&self, template: &str, context: &TemplateContext<'_>) -> Result<String>;
}

pub struct JinjaRenderer {
    env: Environment<'static>,
}

impl JinjaRenderer {
    pub fn new(template_dir: &Path) -> JinjaRenderer {
        let mut env = Environment::new();
        env.set_loader(path_loader(template_dir.to_path_buf()));
        JinjaRenderer { env }
    }
}

impl Renderer for JinjaRenderer {
    fn render(&self, template: &str, context: &TemplateContext<'_>) -> Result<String> {
        let template = self.env.get_template(&format!("{template}{EXTENSION}"))?;
        Ok(template.render(context! {
            senderName => context.sender_name,
            recipientName => context.recipient_name,
        })?)
    }
}
