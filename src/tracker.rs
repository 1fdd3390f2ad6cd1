//! Point completeness tracker: the draft state for the point being processed.
//!
//! A draft accumulates photos, a quantity, and a comment between commands.
//! Nothing here touches storage — the workflow persists drafts so a point
//! survives process restarts, and clears them on commit or cancel. Until
//! the commit, a draft has no durable side effect.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures while filling in a draft. All are recovered locally:
/// the draft is left unchanged and the courier re-prompted.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("quantity must be between {min} and {max}")]
    QuantityOutOfRange { min: u32, max: u32 },

    #[error("quantity exceeds what this point can accept (max {max})")]
    QuantityExceedsAvailable { max: u32 },

    #[error("comment is empty")]
    EmptyComment,

    #[error("comment too long (max {max} characters)")]
    CommentTooLong { max: usize },
}

/// The bound applied to a submitted quantity.
///
/// Collection points use the configured range; delivery points are capped
/// by the remaining quantity-to-deliver, with a distinct error so the
/// message can carry the allowed maximum.
#[derive(Debug, Clone, Copy)]
pub enum QuantityBound {
    Configured { min: u32, max: u32 },
    Remaining { max: u32 },
}

/// Draft state for one (session, point index).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PointDraft {
    pub photos: Vec<String>,
    pub quantity: Option<u32>,
    pub comment: Option<String>,
}

impl PointDraft {
    /// Appends a photo reference. Photos only support append and
    /// remove-last; there is no edit-in-place.
    pub fn add_photo(&mut self, photo_ref: impl Into<String>) {
        self.photos.push(photo_ref.into());
    }

    /// Removes and returns the most recently added photo, if any.
    pub fn remove_last_photo(&mut self) -> Option<String> {
        self.photos.pop()
    }

    /// Sets the quantity, overwriting any previous value.
    ///
    /// Zero is a valid "collected nothing" outcome as long as the bound
    /// permits it.
    pub fn set_quantity(&mut self, quantity: u32, bound: QuantityBound) -> Result<(), DraftError> {
        match bound {
            QuantityBound::Configured { min, max } => {
                if quantity < min || quantity > max {
                    return Err(DraftError::QuantityOutOfRange { min, max });
                }
            }
            QuantityBound::Remaining { max } => {
                if quantity > max {
                    return Err(DraftError::QuantityExceedsAvailable { max });
                }
            }
        }
        self.quantity = Some(quantity);
        Ok(())
    }

    /// Sets the comment, overwriting any previous value.
    ///
    /// Point comments are mandatory and bounded; only lab summaries accept
    /// an absent comment, and those never pass through a draft.
    pub fn set_comment(&mut self, comment: impl Into<String>, max: usize) -> Result<(), DraftError> {
        let comment = comment.into();
        if comment.trim().is_empty() {
            return Err(DraftError::EmptyComment);
        }
        if comment.chars().count() > max {
            return Err(DraftError::CommentTooLong { max });
        }
        self.comment = Some(comment);
        Ok(())
    }

    /// True once photos are present, a quantity is set (zero counts), and
    /// a comment is set.
    pub fn is_complete(&self) -> bool {
        !self.photos.is_empty() && self.quantity.is_some() && self.comment.is_some()
    }

    /// Names of the inputs still missing, for re-prompting.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.photos.is_empty() {
            missing.push("photo");
        }
        if self.quantity.is_none() {
            missing.push("quantity");
        }
        if self.comment.is_none() {
            missing.push("comment");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUND: QuantityBound = QuantityBound::Configured { min: 0, max: 100 };

    #[test]
    fn empty_draft_is_incomplete() {
        let draft = PointDraft::default();
        assert!(!draft.is_complete());
        assert_eq!(draft.missing(), vec!["photo", "quantity", "comment"]);
    }

    #[test]
    fn complete_once_all_three_present() {
        let mut draft = PointDraft::default();
        draft.add_photo("photo-1");
        draft.set_quantity(5, BOUND).unwrap();
        draft.set_comment("all crates sealed", 500).unwrap();

        assert!(draft.is_complete());
        assert!(draft.missing().is_empty());
    }

    #[test]
    fn zero_quantity_counts_as_set() {
        let mut draft = PointDraft::default();
        draft.add_photo("photo-1");
        draft.set_quantity(0, BOUND).unwrap();
        draft.set_comment("nothing to pick up today", 500).unwrap();

        assert!(draft.is_complete());
    }

    #[test]
    fn quantity_out_of_configured_range_rejected() {
        let mut draft = PointDraft::default();
        let err = draft.set_quantity(101, BOUND).unwrap_err();

        assert!(matches!(
            err,
            DraftError::QuantityOutOfRange { min: 0, max: 100 }
        ));
        assert_eq!(draft.quantity, None);
    }

    #[test]
    fn quantity_above_remaining_rejected_with_max() {
        let mut draft = PointDraft::default();
        let err = draft
            .set_quantity(15, QuantityBound::Remaining { max: 10 })
            .unwrap_err();

        assert!(matches!(err, DraftError::QuantityExceedsAvailable { max: 10 }));
        assert_eq!(draft.quantity, None);
    }

    #[test]
    fn quantity_resubmission_overwrites() {
        let mut draft = PointDraft::default();
        draft.set_quantity(5, BOUND).unwrap();
        draft.set_quantity(7, BOUND).unwrap();

        assert_eq!(draft.quantity, Some(7));
    }

    #[test]
    fn comment_rules() {
        let mut draft = PointDraft::default();

        assert!(matches!(
            draft.set_comment("   ", 500).unwrap_err(),
            DraftError::EmptyComment
        ));
        assert!(matches!(
            draft.set_comment("x".repeat(501), 500).unwrap_err(),
            DraftError::CommentTooLong { max: 500 }
        ));

        draft.set_comment("x".repeat(500), 500).unwrap();
        assert_eq!(draft.comment.as_ref().unwrap().len(), 500);

        // Resubmission overwrites.
        draft.set_comment("shorter", 500).unwrap();
        assert_eq!(draft.comment.as_deref(), Some("shorter"));
    }

    #[test]
    fn photos_append_and_remove_last() {
        let mut draft = PointDraft::default();
        draft.add_photo("a");
        draft.add_photo("b");

        assert_eq!(draft.remove_last_photo().as_deref(), Some("b"));
        assert_eq!(draft.photos, vec!["a"]);

        draft.remove_last_photo();
        assert_eq!(draft.remove_last_photo(), None);
    }
}
