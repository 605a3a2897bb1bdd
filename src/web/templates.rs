use anyhow::Result;
use chrono::{DateTime, Utc};
use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use serde::Serialize;

use crate::core::error::AppResult;

pub const NOT_FOUND: &str = "404";
pub const SERVER_ERROR: &str = "500";

/// `{{moment ts}}` renders an RFC 3339 timestamp as `YYYY-MM-DD HH:MM UTC`;
/// anything unparseable is written back unchanged.
fn moment_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let raw = h.param(0).and_then(|p| p.value().as_str()).unwrap_or("");
    let rendered = DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc).format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|_| raw.to_string());
    out.write(&rendered)?;
    Ok(())
}

pub struct Templates {
    registry: Handlebars<'static>,
}

impl Templates {
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_helper("moment", Box::new(moment_helper));
        registry.register_template_string(NOT_FOUND, include_str!("../../templates/404.html.hbs"))?;
        registry.register_template_string(SERVER_ERROR, include_str!("../../templates/500.html.hbs"))?;
        Ok(Self { registry })
    }

    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> AppResult<String> {
        Ok(self.registry.render(name, data)?)
    }
}
