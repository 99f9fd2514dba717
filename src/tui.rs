use crossterm::{
    cursor::MoveToPreviousLine,
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use std::io;

/// Terminal progress for one pipeline run.
pub struct RunTUI {
    total_listings: usize,
    extracted: usize,
    skipped: usize,
    stored_before: usize,
    progress_bar_printed: bool,
}

impl RunTUI {
    pub fn new() -> Self {
        Self {
            total_listings: 0,
            extracted: 0,
            skipped: 0,
            stored_before: 0,
            progress_bar_printed: false,
        }
    }

    /// Grey line with the size of the store before the run
    pub fn show_summary(&mut self, stored: usize) -> io::Result<()> {
        self.stored_before = stored;
        execute!(
            io::stdout(),
            SetForegroundColor(Color::DarkGrey),
            Print(format!("📁 Store holds {} listings\n", stored)),
            ResetColor
        )
    }

    pub fn start_listings(&mut self, source: &str, total: usize) -> io::Result<()> {
        self.total_listings = total;
        execute!(
            io::stdout(),
            SetForegroundColor(Color::White),
            Print(format!("🔍 Found {} listings on {}\n", total, source)),
            ResetColor
        )?;
        if total > 0 {
            self.print_progress_bar()?;
            self.progress_bar_printed = true;
        }
        Ok(())
    }

    pub fn listing_extracted(&mut self, id: &str) -> io::Result<()> {
        self.extracted += 1;
        self.print_listing_line(Color::Green, "✅", id)
    }

    pub fn listing_skipped(&mut self, label: &str, reason: &str) -> io::Result<()> {
        self.skipped += 1;
        self.print_listing_line(Color::Red, "❌", &format!("{} ({})", label, reason))
    }

    pub fn show_final_summary(&mut self, inserted: usize, replaced: usize, total: usize) -> io::Result<()> {
        self.clear_progress_bar()?;

        execute!(
            io::stdout(),
            Print("─".repeat(80)),
            Print("\n"),
            SetForegroundColor(Color::Green),
            Print(format!(
                "✅ Run completed: {} extracted, {} new, {} replaced",
                self.extracted, inserted, replaced
            )),
            ResetColor
        )?;

        if self.skipped > 0 {
            execute!(
                io::stdout(),
                SetForegroundColor(Color::Red),
                Print(format!(", {} skipped", self.skipped)),
                ResetColor
            )?;
        }

        execute!(
            io::stdout(),
            SetForegroundColor(Color::DarkGrey),
            Print(format!(" | DB: {} total\n", total)),
            ResetColor
        )
    }

    fn print_listing_line(&mut self, color: Color, icon: &str, text: &str) -> io::Result<()> {
        self.clear_progress_bar()?;
        execute!(
            io::stdout(),
            SetForegroundColor(color),
            Print(format!("  {} {}\n", icon, truncate(text))),
            ResetColor
        )?;
        self.print_progress_bar()?;
        self.progress_bar_printed = true;
        Ok(())
    }

    fn print_progress_bar(&self) -> io::Result<()> {
        execute!(
            io::stdout(),
            SetForegroundColor(Color::White),
            Print(self.create_progress_bar_text()),
            Print("\n"),
            ResetColor
        )
    }

    fn create_progress_bar_text(&self) -> String {
        let done = self.extracted + self.skipped;
        let total = self.total_listings.max(1);
        let percentage = (done * 100) / total;

        let bar_width = 30;
        let filled = ((done * bar_width) / total).min(bar_width);
        let progress_bar = format!("[{}{}]", "█".repeat(filled), "░".repeat(bar_width - filled));

        format!(
            "Progress: {} {}/{} ({}%) | DB: {} before run",
            progress_bar, done, self.total_listings, percentage, self.stored_before
        )
    }

    fn clear_progress_bar(&mut self) -> io::Result<()> {
        if self.progress_bar_printed {
            execute!(
                io::stdout(),
                MoveToPreviousLine(1),
                Clear(ClearType::CurrentLine),
            )?;
            self.progress_bar_printed = false;
        }
        Ok(())
    }
}

impl Default for RunTUI {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() > 80 {
        format!("{}...", text.chars().take(77).collect::<String>())
    } else {
        text.to_string()
    }
}
