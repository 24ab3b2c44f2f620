//! Positional format templates.
//!
//! A template is literal expression text with `{index}` / `{index:spec}`
//! argument markers:
//!
//! ```text
//! #pk = {0} AND created BETWEEN {1:o} AND {2:o}
//! ```
//!
//! Literal text is copied verbatim, including any explicit `#name` placeholders
//! the caller resolves through its own name map. Each marker becomes a fresh
//! value placeholder bound to the formatted argument. `{{` and `}}` produce
//! literal braces.

use crate::builder::CompiledExpression;
use crate::config::CompilerConfig;
use crate::context::ExpressionContext;
use crate::error::{ExpressionError, ExpressionResult};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'t> {
    Text(&'t str),
    Arg { index: usize, spec: Option<&'t str> },
}

/// Compile `template` into `ctx`, returning the expression fragment.
///
/// The whole template is parsed and every index checked before anything is
/// bound.
pub fn compile_template(
    ctx: &mut ExpressionContext<'_>,
    template: &str,
    args: &[Value],
) -> ExpressionResult<String> {
    let segments = parse(template)?;

    if let Some(index) = segments.iter().find_map(|segment| match segment {
        Segment::Arg { index, .. } if *index >= args.len() => Some(*index),
        _ => None,
    }) {
        return Err(ExpressionError::unsupported(
            "format argument",
            format!("{{{index}}} is out of range, {} argument(s) supplied", args.len()),
        ));
    }

    let mut out = String::with_capacity(template.len());
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Arg { index, spec } => {
                let token = ctx.bind_literal(&args[index], None, spec)?;
                out.push_str(&token);
            }
        }
    }
    Ok(out)
}

/// Compile a standalone template with the default configuration.
///
/// No metadata is involved, so the result never carries name bindings. Use a
/// builder to mix templates with typed expressions or explicit name maps.
pub fn compile_format(template: &str, args: &[Value]) -> ExpressionResult<CompiledExpression> {
    let mut ctx = ExpressionContext::new(&CompilerConfig::default());
    let expression = compile_template(&mut ctx, template, args)?;
    let (names, values) = ctx.finish();
    Ok(CompiledExpression {
        expression,
        names,
        values,
    })
}

fn parse(template: &str) -> ExpressionResult<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        if pos > 0 {
            segments.push(Segment::Text(&rest[..pos]));
        }
        let tail = &rest[pos..];
        let offset = template.len() - tail.len();

        if tail.starts_with("{{") {
            segments.push(Segment::Text("{"));
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with("}}") {
            segments.push(Segment::Text("}"));
            rest = &tail[2..];
            continue;
        }
        if tail.starts_with('}') {
            return Err(ExpressionError::unsupported(
                "format template",
                format!("unmatched '}}' at offset {offset}"),
            ));
        }

        let close = tail.find('}').ok_or_else(|| {
            ExpressionError::unsupported(
                "format template",
                format!("unterminated argument marker at offset {offset}"),
            )
        })?;
        let marker = &tail[1..close];
        let (index, spec) = match marker.split_once(':') {
            Some((index, spec)) => (index, Some(spec)),
            None => (marker, None),
        };
        let index = index.trim().parse::<usize>().map_err(|_| {
            ExpressionError::unsupported(
                "format argument",
                format!("'{{{marker}}}' is not a positional argument marker"),
            )
        })?;
        segments.push(Segment::Arg { index, spec });
        rest = &tail[close + 1..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    Ok(segments)
}
