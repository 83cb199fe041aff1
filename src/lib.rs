//! # obsidian-gource-vis-jj
//!
//! A CLI tool that turns the [Jujutsu](https://github.com/jj-vcs/jj) history of an
//! [Obsidian](https://obsidian.md) vault into a [Gource](https://gource.io) custom log.
//!
//! ## What it does
//!
//! Gource animates a repository as a tree of directories. A vault's folder layout
//! usually says little about how its notes relate, so this tool places every note
//! under its **tags** instead: a note tagged `#project-x` shows up as
//! `project-x/<note>.md`, and notes sharing a tag cluster together. A note with
//! several tags appears once per tag; a note without tags lands in `untagged/`.
//!
//! The history is read with `jj log --summary`, and each note is read back at the
//! revision it changed (`jj file show`) to find the tags it had at that point in
//! time. Tags come from inline `#tag` tokens and from the `tags:` frontmatter key.
//!
//! Nothing is ever written to the vault or the repository.
//!
//! ## Usage
//!
//! ```sh
//! # Generate the log and play it
//! obsidian-gource-vis-jj ~/notes > vault.log
//! gource --log-format custom vault.log
//!
//! # Or straight into gource
//! obsidian-gource-vis-jj ~/notes | gource --log-format custom -
//! ```
//!
//! Preferences can be persisted in `~/.config/obsidian-gource-vis-jj/config.toml`.
pub mod config;
pub mod gource;
pub mod history;
pub mod paths;
pub mod pipeline;
pub mod tags;
