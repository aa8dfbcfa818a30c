//! Capture-slot bookkeeping (§3.3) and branch-reset frames (§3.4).
//!
//! `CaptureState` accumulates the tables the prescan (§4.2) builds in one
//! pass over the pattern body, with no AST emission: which external slot
//! number opened at which position, which names map to which slots, and
//! the running "one past the maximum observed slot" counter. The writer
//! later turns this into a dense remap (`MapCapnum`); see
//! `core::writer::build_capture_remap`.

use crate::core::errors::ParseErrorKind;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct CaptureState {
    /// External slot number -> byte/char position of its opening `(`.
    pub caps: HashMap<i32, usize>,
    /// Group name -> external slot number.
    pub capnames: HashMap<String, i32>,
    /// Group names in declaration order (merged with the numeric list by
    /// the writer when it builds `RegexCode::cap_names`).
    pub capnamelist: Vec<String>,
    /// One past the maximum external slot observed so far.
    pub captop: i32,
    /// Sorted list of used external slots, populated only if they are
    /// non-contiguous (dense 1..captop-1 doesn't need this).
    pub capnumlist: Option<Vec<i32>>,
    next_auto: i32,
}

impl CaptureState {
    pub fn new() -> Self {
        CaptureState {
            caps: HashMap::new(),
            capnames: HashMap::new(),
            capnamelist: Vec::new(),
            captop: 1,
            capnumlist: None,
            next_auto: 1,
        }
    }

    /// Allocates the next auto-numbered capture slot (for a bare `(...)`
    /// with no explicit number).
    pub fn next_auto_slot(&mut self) -> i32 {
        let slot = self.next_auto;
        self.next_auto += 1;
        slot
    }

    /// Lets a branch-reset frame rewind the auto-numbering counter so
    /// sibling alternatives reuse the same slots (§3.4).
    pub fn set_next_auto(&mut self, value: i32) {
        self.next_auto = value;
    }

    pub fn next_auto(&self) -> i32 {
        self.next_auto
    }

    /// Records that external slot `slot` opened at `pos`.
    pub fn note_open(&mut self, slot: i32, pos: usize) {
        self.caps.insert(slot, pos);
        if slot + 1 > self.captop {
            self.captop = slot + 1;
        }
    }

    /// Records a name for `slot`. Implements the open-question resolution
    /// in spec §9: uniqueness of names is enforced unless `dup_names`
    /// (the `J` modifier) is set, and two *different* names collapsing
    /// onto the *same* slot is always rejected unless `dup_names` is set
    /// (branch-reset groups legitimately do this on purpose, which is
    /// exactly the case `dup_names` exists to allow).
    pub fn note_name(
        &mut self,
        name: &str,
        slot: i32,
        dup_names: bool,
    ) -> Result<(), ParseErrorKind> {
        if let Some(&existing) = self.capnames.get(name) {
            if existing != slot && !dup_names {
                return Err(ParseErrorKind::DuplicateName);
            }
            return Ok(());
        }
        if !dup_names {
            for (other_name, &other_slot) in self.capnames.iter() {
                if other_slot == slot && other_name != name {
                    return Err(ParseErrorKind::NameSlotCollision);
                }
            }
        }
        self.capnames.insert(name.to_string(), slot);
        self.capnamelist.push(name.to_string());
        Ok(())
    }

    /// `AssignNameSlots` (§4.2): sorts the numeric slots actually used and
    /// decides whether a non-contiguous `capnumlist` is needed.
    pub fn assign_name_slots(&mut self) {
        let mut used: Vec<i32> = self.caps.keys().copied().collect();
        used.sort_unstable();
        let contiguous = used
            .iter()
            .enumerate()
            .all(|(i, &slot)| slot as usize == i + 1);
        self.capnumlist = if contiguous || used.is_empty() {
            None
        } else {
            Some(used)
        };
    }

    pub fn slot_for_name(&self, name: &str) -> Option<i32> {
        self.capnames.get(name).copied()
    }

    pub fn is_defined(&self, slot: i32) -> bool {
        slot == 0 || self.caps.contains_key(&slot)
    }
}

/// Per-`(?|...)` branch-reset stack frame (§3.4).
#[derive(Debug, Clone, Copy)]
pub struct BranchResetFrame {
    /// Value of the auto-capture counter at the moment the group opened.
    pub start_autocap: i32,
    /// Running maximum across alternatives seen so far.
    pub max_autocap: i32,
    /// Nesting depth of groups opened *inside* this branch-reset group,
    /// used to know when a `(` belongs to this frame vs. a nested one.
    pub nested_groups: i32,
}

impl BranchResetFrame {
    pub fn new(start_autocap: i32) -> Self {
        BranchResetFrame {
            start_autocap,
            max_autocap: start_autocap,
            nested_groups: 0,
        }
    }
}
