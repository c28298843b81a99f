use std::io::{self, Write};

use console::Style;
use copycatch_core::{Diff, SymbolTable, TokenFile};

fn added_style() -> Style {
    Style::new().white().on_red().bold()
}

fn changed_style() -> Style {
    Style::new().black().on_yellow().bold()
}

// one side of an alignment in file order, additions on red and changes on
// yellow
pub(crate) fn render_file_diff(
    out: &mut impl Write,
    file: &TokenFile,
    diff: &[Diff],
    wdiff: &[Diff],
    symbols: &SymbolTable,
) -> io::Result<()> {
    writeln!(out, "==> {} <==", file.path)?;
    for (i, &id) in file.content.iter().enumerate() {
        write_run(out, &file.spaces[i], wdiff[i])?;
        let text = symbols.text(id);
        match diff[i] {
            Diff::Same => write!(out, "{text}")?,
            Diff::Added => write!(out, "{}", added_style().apply_to(text))?,
            Diff::Changed => write!(out, "{}", changed_style().apply_to(text))?,
        }
    }
    if let (Some(run), Some(&tag)) = (file.spaces.last(), wdiff.last()) {
        write_run(out, run, tag)?;
    }
    writeln!(out)
}

// a highlighted run would swallow its own line breaks, so each newline
// inside one is rendered as a visible \n marker followed by a real break
fn write_run(out: &mut impl Write, run: &str, tag: Diff) -> io::Result<()> {
    let style = match tag {
        Diff::Same => return write!(out, "{run}"),
        Diff::Added => added_style(),
        Diff::Changed => changed_style(),
    };
    let normalized = run.replace("\r\n", "\n");
    let mut first = true;
    for piece in normalized.split('\n') {
        if !first {
            writeln!(out, "{}", style.apply_to("\\n"))?;
        }
        if !piece.is_empty() {
            write!(out, "{}", style.apply_to(piece))?;
        }
        first = false;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use copycatch_core::align;

    #[test]
    fn renders_tokens_runs_and_newline_markers() {
        console::set_colors_enabled(false);
        let mut symbols = SymbolTable::new();
        let a = TokenFile::parse("a", "x\ny", &mut symbols);
        let b = TokenFile::parse("b", "x", &mut symbols);
        let alignment = align(&a, &b);

        let mut out = Vec::new();
        render_file_diff(&mut out, &a, &alignment.diff_a, &alignment.wdiff_a, &symbols).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "==> a <==\nx\\n\ny\n");
    }

    #[test]
    fn identical_sides_render_verbatim() {
        console::set_colors_enabled(false);
        let mut symbols = SymbolTable::new();
        let source = "int main() {\n    return 0;\n}\n";
        let a = TokenFile::parse("same", source, &mut symbols);
        let b = TokenFile::parse("same2", source, &mut symbols);
        let alignment = align(&a, &b);

        let mut out = Vec::new();
        render_file_diff(&mut out, &a, &alignment.diff_a, &alignment.wdiff_a, &symbols).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, format!("==> same <==\n{source}\n"));
    }
}
