//! Command implementations.
//!
//! Each command writes to the given writer rather than stdout directly, so the
//! output can be checked in tests.

use std::io::Write;

use anyhow::{Context, Result};
use clap::ValueEnum;
use console::Style;
use lineage::{Theme, ThemeFactory};
use serde::Serialize;

/// Serialization format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    #[default]
    Yaml,
    Json,
}

impl Format {
    fn write<T: Serialize>(self, out: &mut dyn Write, value: &T) -> Result<()> {
        match self {
            Format::Yaml => {
                let yaml = serde_yaml::to_string(value).context("failed to serialize as YAML")?;
                write!(out, "{}", yaml)?;
            }
            Format::Json => {
                let json =
                    serde_json::to_string_pretty(value).context("failed to serialize as JSON")?;
                writeln!(out, "{}", json)?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct Assets<'a> {
    theme: &'a str,
    lineage: Vec<&'a str>,
    stylesheets: Vec<&'a str>,
    javascripts: Vec<&'a str>,
}

/// Prints the fully resolved theme, ancestors included.
pub fn resolve(factory: &ThemeFactory<Theme>, name: &str, format: Format, out: &mut dyn Write) -> Result<()> {
    let theme = factory
        .get_theme(name)
        .with_context(|| format!("failed to resolve theme \"{}\"", name))?;
    format.write(out, &theme)
}

/// Prints the inheritance chain, root first, with the file each theme was
/// declared in. Does not read or write the cache.
pub fn chain(factory: &ThemeFactory<Theme>, name: &str, out: &mut dyn Write) -> Result<()> {
    let chain = factory
        .resolve_chain(name)
        .with_context(|| format!("failed to walk the chain of \"{}\"", name))?;

    let name_style = Style::new().bold();
    let path_style = Style::new().dim();
    for (depth, (theme, fragment)) in chain.themes().iter().zip(chain.fragments()).enumerate() {
        writeln!(
            out,
            "{}{} {}",
            "  ".repeat(depth),
            name_style.apply_to(theme),
            path_style.apply_to(fragment.source().display())
        )?;
    }
    Ok(())
}

/// Prints the stylesheets and scripts a theme pulls in from its whole chain.
pub fn assets(factory: &ThemeFactory<Theme>, name: &str, format: Format, out: &mut dyn Write) -> Result<()> {
    let theme = factory
        .get_theme(name)
        .with_context(|| format!("failed to resolve theme \"{}\"", name))?;

    let assets = Assets {
        theme: theme.name(),
        lineage: theme.lineage(),
        stylesheets: theme.inherited_stylesheets(),
        javascripts: theme.inherited_javascripts(),
    };
    format.write(out, &assets)
}

pub fn clear_cache(factory: &ThemeFactory<Theme>, out: &mut dyn Write) -> Result<()> {
    factory.clear_cache().context("failed to clear the theme cache")?;
    writeln!(out, "cleared theme cache")?;
    Ok(())
}

pub fn invalidate(factory: &ThemeFactory<Theme>, name: &str, out: &mut dyn Write) -> Result<()> {
    factory
        .invalidate(name)
        .with_context(|| format!("failed to invalidate \"{}\"", name))?;
    writeln!(out, "invalidated {}", name)?;
    Ok(())
}
