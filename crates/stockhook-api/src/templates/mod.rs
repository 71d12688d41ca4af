//! HTML page templates
//!
//! Pages are rendered with MiniJinja from templates compiled into the binary. Every
//! template name ends in `.html`, which turns on auto-escaping: each string coming
//! from a payload or a record is escaped exactly once, here, and nowhere else.

use minijinja::Environment;
use serde::Serialize;
use stockhook_core::AppError;

pub const INDEX: &str = "index.html";
pub const VIEW: &str = "view.html";

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("base.html")),
    ("macros.html", include_str!("macros.html")),
    (INDEX, include_str!("index.html")),
    (VIEW, include_str!("view.html")),
];

pub struct Pages {
    env: Environment<'static>,
}

impl Pages {
    /// Compile all templates. Syntax errors surface here, at startup.
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        Ok(Self { env })
    }

    pub fn render<S: Serialize>(&self, name: &str, context: S) -> Result<String, AppError> {
        let template = self
            .env
            .get_template(name)
            .map_err(|e| AppError::Internal(format!("template {} missing: {}", name, e)))?;
        template
            .render(context)
            .map_err(|e| AppError::Internal(format!("template {} failed: {}", name, e)))
    }
}
