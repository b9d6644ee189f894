//! Console prompt handler.
//!
//! Reads answers from stdin. The engine serializes prompt calls, so at
//! most one question is on screen at a time.

use std::io::{BufRead, IsTerminal, Write};

use curateur_lib::{CandidateChoice, PromptHandler};

pub struct ConsolePrompts;

impl ConsolePrompts {
    pub fn is_tty() -> bool {
        std::io::stdin().is_terminal()
    }

    fn read_line() -> String {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        line.trim().to_lowercase()
    }

    fn ask_yes_no(question: &str) -> bool {
        loop {
            print!("{question} [y/N]: ");
            let _ = std::io::stdout().flush();
            match Self::read_line().as_str() {
                "y" | "yes" => return true,
                "n" | "no" | "" => return false,
                _ => println!("Please enter 'y' or 'n'"),
            }
        }
    }
}

impl PromptHandler for ConsolePrompts {
    fn confirm_integrity_cleanup(
        &self,
        platform: &str,
        missing: usize,
        total: usize,
        ratio: f64,
    ) -> bool {
        println!();
        println!("WARNING: catalog integrity issue detected");
        println!("Platform: {platform}");
        println!("Catalog entries: {total}");
        println!(
            "ROMs present: {} ({:.1}%)",
            total - missing,
            ratio * 100.0
        );
        println!("Missing ROMs: {missing}");
        println!();
        println!("Proceeding will:");
        println!("  - Remove {missing} entries from the catalog");
        println!("  - Move their media into the CLEANUP tree");
        println!();
        Self::ask_yes_no("Proceed?")
    }

    fn select_search_candidate(
        &self,
        rom_name: &str,
        candidates: &[(String, f64)],
    ) -> CandidateChoice {
        println!();
        println!("No confident match for '{rom_name}'. Candidates:");
        for (i, (name, confidence)) in candidates.iter().enumerate() {
            println!("  {}) {name} ({:.0}%)", i + 1, confidence * 100.0);
        }
        loop {
            print!("Select [1-{}], (s)kip, or (c)ancel: ", candidates.len());
            let _ = std::io::stdout().flush();
            let answer = Self::read_line();
            match answer.as_str() {
                "s" | "skip" | "" => return CandidateChoice::Skip,
                "c" | "cancel" => return CandidateChoice::Cancel,
                n => {
                    if let Ok(i) = n.parse::<usize>() {
                        if i >= 1 && i <= candidates.len() {
                            return CandidateChoice::Select(i - 1);
                        }
                    }
                    println!("Invalid choice");
                }
            }
        }
    }

    fn confirm_media_cleanup(&self, platform: &str, type_dir: &str, files: usize) -> bool {
        println!();
        println!(
            "Media type '{type_dir}' is no longer enabled for '{platform}' \
             ({files} files on disk)."
        );
        Self::ask_yes_no("Move them to the CLEANUP tree?")
    }
}
