//! Reviewers requested by the review checklist.
//!
//! On governance pull requests a bot posts a review checklist as a Markdown
//! table. Rows whose status cell carries a pending marker name, as
//! `@login` mentions, the reviewers whose answer is still expected.

use serde::{Deserialize, Serialize};

use crate::roster::account_handle;
use crate::Identity;

/// One comment on a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullComment {
    /// Login of the comment's author.
    pub author: String,
    pub body: String,
}

/// Cells per checklist row, counting the empty cells outside the outer pipes.
const ROW_CELLS: usize = 7;
const REVIEWERS_CELL: usize = 4;
const STATUS_CELL: usize = 5;

/// How the checklist comment is recognised and read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecklistPolicy {
    /// Consult the checklist at all.
    pub enabled: bool,
    /// Login of the bot that posts the checklist.
    pub bot_login: String,
    /// Text that marks a comment as a checklist; any one suffices.
    pub headings: Vec<String>,
    /// Status cells of rows still waiting for a reviewer.
    pub pending_markers: Vec<String>,
}

impl Default for ChecklistPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            bot_login: "openeuler-ci-bot".to_string(),
            headings: vec![
                "以下为 openEuler-Advisor 的 review_tool 生成审视要求清单".to_string(),
                "The following table is the PR review checklist generated by the review_tool of openEuler-Advisor"
                    .to_string(),
            ],
            pending_markers: ["[&#x1F534;]", "[&#x25EF;]", "[&#x1F7E1;]", "[&#x1F535;]"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl ChecklistPolicy {
    /// The most recent checklist among `comments` (oldest first).
    pub fn latest_checklist<'c>(&self, comments: &'c [PullComment]) -> Option<&'c PullComment> {
        comments.iter().rev().find(|c| {
            c.author == self.bot_login && self.headings.iter().any(|h| c.body.contains(h.as_str()))
        })
    }

    /// Reviewers mentioned on pending rows of the latest checklist, in
    /// first-mention order.
    pub fn pending_reviewers(&self, comments: &[PullComment]) -> Vec<Identity> {
        let Some(checklist) = self.latest_checklist(comments) else {
            return Vec::new();
        };
        let mut reviewers: Vec<Identity> = Vec::new();
        for line in checklist.body.lines() {
            let cells: Vec<&str> = line.split('|').collect();
            if cells.len() != ROW_CELLS {
                continue;
            }
            let status = cells[STATUS_CELL].trim();
            if !self.pending_markers.iter().any(|m| m == status) {
                continue;
            }
            let mentioned = cells[REVIEWERS_CELL]
                .split_whitespace()
                .filter_map(|token| token.strip_prefix('@'))
                .filter_map(account_handle);
            for reviewer in mentioned {
                if !reviewers.contains(&reviewer) {
                    reviewers.push(reviewer);
                }
            }
        }
        reviewers
    }
}
