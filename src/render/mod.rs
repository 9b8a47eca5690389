use std::time::Duration;

use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};

use crate::model::{Cell, ListRecord};
use crate::query::Page;

/// Render seam between the controller and whatever paints the list.
/// Selection is re-seeded by the controller on every call, so a view
/// never has to carry row state across renders.
pub trait ListView<R: ListRecord> {
    fn render(&mut self, page: &Page<R>);
}

/// Deterministic label-to-style mapping for status/role badges.
/// Unknown labels fall back to plain text rather than erroring.
pub fn badge_style(label: &str) -> ColoredString {
    match label.trim().to_lowercase().as_str() {
        "on time" | "present" | "active" => label.green(),
        "late" => label.yellow(),
        "absent" | "inactive" => label.red(),
        "admin" => label.magenta(),
        "co-admin" => label.cyan(),
        _ => label.normal(),
    }
}

/// Pagination footer. `Page 0 of 0` is the canonical empty state.
pub fn page_footer(current_page: u32, total_pages: u32) -> String {
    let shown = if total_pages == 0 { 0 } else { current_page };
    let mut out = format!("Page {} of {}", shown, total_pages);
    if total_pages == 0 || shown <= 1 {
        out.push_str(" [prev disabled]");
    }
    if total_pages == 0 || shown >= total_pages {
        out.push_str(" [next disabled]");
    }
    out
}

pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Prints one page of records as an aligned table plus footer.
#[derive(Clone, Copy, Debug, Default)]
pub struct TablePrinter;

impl TablePrinter {
    // widths in chars, not bytes: `{:<width$}` pads by char count,
    // so byte lengths over-pad anything outside ASCII
    fn column_widths<R: ListRecord>(rows: &[Vec<Cell>]) -> Vec<usize> {
        let mut widths: Vec<usize> = R::columns().iter().map(|c| c.chars().count()).collect();
        for row in rows {
            for (i, cell) in row.iter().enumerate() {
                if i < widths.len() {
                    widths[i] = widths[i].max(cell.text.chars().count());
                }
            }
        }
        widths
    }
}

impl<R: ListRecord> ListView<R> for TablePrinter {
    fn render(&mut self, page: &Page<R>) {
        let rows: Vec<Vec<Cell>> = page.items.iter().map(|r| r.row()).collect();
        let widths = Self::column_widths::<R>(&rows);

        let header = R::columns()
            .iter()
            .zip(widths.iter())
            .map(|(c, w)| format!("{:<width$}", c, width = w))
            .collect::<Vec<_>>()
            .join("  ");
        println!("{}", header.bold().white());

        for row in rows.iter() {
            let mut line = String::new();
            for (i, cell) in row.iter().enumerate() {
                if i > 0 {
                    line.push_str("  ");
                }
                let padded = format!("{:<width$}", cell.text, width = widths[i]);
                if cell.badge {
                    line.push_str(&badge_style(&padded).to_string());
                } else {
                    line.push_str(&padded);
                }
            }
            println!("{}", line);
        }

        if page.items.is_empty() {
            println!("{}", "no records".dimmed());
        }
        println!("{}", page_footer(page.current_page, page.total_pages));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Student;

    #[test]
    fn column_widths_count_chars_not_bytes() {
        let rows = vec![vec![
            Cell::plain("12"),
            Cell::plain("Peña"),
            Cell::plain("p@school.ph"),
            Cell::plain("7"),
            Cell::plain("7-A"),
        ]];
        let widths = TablePrinter::column_widths::<Student>(&rows);
        // "Peña" is four chars and five bytes; byte widths would
        // misalign every row below it
        assert_eq!(widths[1], 4);
        assert_eq!(widths[2], "p@school.ph".len());
    }

    #[test]
    fn footer_empty_state_is_page_zero_of_zero() {
        let footer = page_footer(1, 0);
        assert!(footer.starts_with("Page 0 of 0"));
        assert!(footer.contains("[prev disabled]"));
        assert!(footer.contains("[next disabled]"));
    }

    #[test]
    fn footer_disables_bounds_only() {
        assert!(page_footer(1, 3).contains("[prev disabled]"));
        assert!(!page_footer(1, 3).contains("[next disabled]"));
        assert!(page_footer(3, 3).contains("[next disabled]"));
        assert!(!page_footer(2, 3).contains("[prev disabled]"));
        assert!(!page_footer(2, 3).contains("[next disabled]"));
    }

    #[test]
    fn unknown_badge_label_is_neutral() {
        colored::control::set_override(false);
        assert_eq!(badge_style("Whatever").to_string(), "Whatever");
        colored::control::unset_override();
    }
}
