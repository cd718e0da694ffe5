use std::io::Write;

use bhlnames_core::{CoreError, Reference, RefsByName, ReferenceName, StreamOutcome};
use owo_colors::OwoColorize;
use serde::Serialize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// One line of `refs` output.
#[derive(Serialize)]
struct OutcomeLine<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a RefsByName>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Write a stream outcome as a single JSON line.
pub fn write_json_line(w: &mut dyn Write, outcome: &StreamOutcome) -> anyhow::Result<()> {
    let line = match &outcome.result {
        Ok(refs) => OutcomeLine {
            id: &outcome.id,
            result: Some(refs),
            error: None,
        },
        Err(e) => OutcomeLine {
            id: &outcome.id,
            result: None,
            error: Some(e.to_string()),
        },
    };
    serde_json::to_writer(&mut *w, &line)?;
    writeln!(w)?;
    Ok(())
}

/// Print the references of one name in a human readable form.
pub fn print_refs(w: &mut dyn Write, refs: &RefsByName, color: ColorMode) -> std::io::Result<()> {
    let header = format!("{} ({} references)", refs.canonical, refs.reference_number);
    if color.enabled() {
        writeln!(w, "{}", header.bold())?;
    } else {
        writeln!(w, "{header}")?;
    }
    if !refs.current_canonical.is_empty() && refs.current_canonical != refs.canonical {
        writeln!(w, "Currently accepted as {}", refs.current_canonical)?;
    }
    if !refs.synonyms.is_empty() {
        writeln!(w, "Synonyms: {}", refs.synonyms.join(", "))?;
    }
    writeln!(w)?;

    for (i, r) in refs.references.iter().enumerate() {
        print_reference(w, i + 1, r, color)?;
    }
    Ok(())
}

fn print_reference(
    w: &mut dyn Write,
    n: usize,
    r: &ReferenceName,
    color: ColorMode,
) -> std::io::Result<()> {
    let rf = &r.reference;
    let line = format!("{n:>3}. {}", location(rf));

    let quality = format!("[{}]", r.ref_match_quality);
    if color.enabled() {
        let quality = match r.ref_match_quality {
            4..=5 => quality.green().to_string(),
            2..=3 => quality.yellow().to_string(),
            _ => quality.dimmed().to_string(),
        };
        writeln!(w, "{quality} {line}")?;
    } else {
        writeln!(w, "{quality} {line}")?;
    }

    if !rf.part.is_empty() {
        writeln!(w, "      part: {} ({})", rf.part.name, rf.part.pages)?;
    }
    if rf.url.is_empty() {
        writeln!(w, "      {}", r.name.name)?;
    } else {
        writeln!(w, "      {} at {}", r.name.name, rf.url)?;
    }

    let s = &r.score;
    let detail = format!(
        "      total {} | year {} | annot {} | title {} | vol {} | pages {} | odds {:.3}",
        s.total,
        s.labels.year,
        s.labels.annot,
        s.labels.title,
        s.labels.vol,
        s.labels.pages,
        s.odds
    );
    if color.enabled() {
        writeln!(w, "{}", detail.dimmed())?;
    } else {
        writeln!(w, "{detail}")?;
    }
    Ok(())
}

/// Title, volume, year and page of a reference on one line.
fn location(rf: &Reference) -> String {
    let year = rf
        .year_aggr
        .map_or_else(|| "????".to_string(), |y| y.to_string());
    let mut line = format!("{} {} ({year}, {})", rf.title_name, rf.volume, rf.year_type);
    if rf.page_num > 0 {
        line.push_str(&format!(" p. {}", rf.page_num));
    }
    line
}

/// Print the reference of a single page.
pub fn print_page_reference(
    w: &mut dyn Write,
    rf: &Reference,
    color: ColorMode,
) -> std::io::Result<()> {
    let line = location(rf);
    if color.enabled() {
        writeln!(w, "{}", line.bold())?;
    } else {
        writeln!(w, "{line}")?;
    }
    if !rf.part.is_empty() {
        writeln!(w, "part: {} ({})", rf.part.name, rf.part.pages)?;
    }
    writeln!(w, "{}", rf.url)?;
    Ok(())
}

/// Print the final summary of a `refs` run.
pub fn print_summary(
    w: &mut dyn Write,
    total: usize,
    failed: usize,
    cancelled: bool,
    color: ColorMode,
) -> std::io::Result<()> {
    let msg = format!("Processed {total} queries, {failed} failed");
    if color.enabled() && failed > 0 {
        writeln!(w, "{}", msg.yellow())?;
    } else {
        writeln!(w, "{msg}")?;
    }
    if cancelled {
        writeln!(w, "Stopped early: cancelled")?;
    }
    Ok(())
}

/// Error text for a failed single query.
pub fn describe_error(e: &CoreError) -> String {
    match e {
        CoreError::UnparseableName(name) => {
            format!("'{name}' does not look like a scientific name")
        }
        other => other.to_string(),
    }
}
