//! Bytecode well-formedness validation (§8).
//!
//! Checks the structural properties a `RegexCode` must hold no matter what
//! pattern produced it: every jump target lies within the instruction
//! stream, every string-table/capture-slot operand is in range, and the
//! dense capture remap (`MapCapnum`) is total and injective over
//! `0..cap_size`. This is a shape check, not a semantic one: it says
//! nothing about whether the program matches what the source pattern
//! meant, only that the (out-of-scope) matcher can safely index into it.

use crate::core::writer::{Inst, RegexCode};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytecode validation error: {}", self.message)
    }
}

impl std::error::Error for ValidationError {}

fn err(message: impl Into<String>) -> ValidationError {
    ValidationError { message: message.into() }
}

/// Validates `code`'s structural well-formedness, per §8. Returns the
/// first violation found; this isn't an exhaustive multi-error collector
/// because the writer either emits a wholly well-formed program or has a
/// bug, and one counterexample is enough to find it.
pub fn validate(code: &RegexCode) -> Result<(), ValidationError> {
    validate_jumps(code)?;
    validate_string_operands(code)?;
    validate_capture_operands(code)?;
    validate_capture_remap(code)?;
    Ok(())
}

fn validate_jumps(code: &RegexCode) -> Result<(), ValidationError> {
    let len = code.codes.len();
    for (i, inst) in code.codes.iter().enumerate() {
        let target = match inst {
            Inst::Lazybranch { target }
            | Inst::Goto { target }
            | Inst::Branchmark { target }
            | Inst::Branchcount { target }
            | Inst::Lazybranchmark { target }
            | Inst::Lazybranchcount { target } => Some(*target),
            _ => None,
        };
        if let Some(target) = target {
            if target > len {
                return Err(err(format!(
                    "instruction {i} jumps to {target}, out of range for a {len}-instruction program"
                )));
            }
        }
    }
    Ok(())
}

fn validate_string_operands(code: &RegexCode) -> Result<(), ValidationError> {
    for (i, inst) in code.codes.iter().enumerate() {
        let str_idx = match inst {
            Inst::Multi { str_idx, .. }
            | Inst::Set { str_idx, .. }
            | Inst::Setloop { str_idx, .. }
            | Inst::Setlazy { str_idx, .. }
            | Inst::Setrep { str_idx, .. } => Some(*str_idx),
            _ => None,
        };
        if let Some(str_idx) = str_idx {
            if str_idx >= code.strings.len() {
                return Err(err(format!(
                    "instruction {i} references string table index {str_idx}, but the table has {} entries",
                    code.strings.len()
                )));
            }
        }
    }
    Ok(())
}

fn validate_capture_operands(code: &RegexCode) -> Result<(), ValidationError> {
    for (i, inst) in code.codes.iter().enumerate() {
        match inst {
            Inst::Ref { slot, .. } | Inst::Testref { slot } | Inst::CallSubroutine { slot } => {
                check_slot(*slot, code.cap_size, i)?;
            }
            Inst::Capturemark { open_slot, close_slot } => {
                check_slot(*open_slot, code.cap_size, i)?;
                if *close_slot != -1 {
                    check_slot(*close_slot, code.cap_size, i)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_slot(slot: i32, cap_size: i32, inst_idx: usize) -> Result<(), ValidationError> {
    if slot < 0 || slot >= cap_size {
        return Err(err(format!(
            "instruction {inst_idx} references capture slot {slot}, out of range for cap_size {cap_size}"
        )));
    }
    Ok(())
}

/// §8: "the dense remap is total and injective over `0..cap_size`":
/// every external slot maps to a distinct dense slot, and every dense
/// slot in `0..cap_size` is hit by exactly one external slot.
fn validate_capture_remap(code: &RegexCode) -> Result<(), ValidationError> {
    let mut seen = vec![false; code.cap_size.max(0) as usize];
    for (&external, &dense) in code.cap_map.iter() {
        if dense < 0 || dense as usize >= seen.len() {
            return Err(err(format!(
                "external slot {external} maps to dense slot {dense}, out of range for cap_size {}",
                code.cap_size
            )));
        }
        if seen[dense as usize] {
            return Err(err(format!("dense capture slot {dense} is claimed by more than one external slot")));
        }
        seen[dense as usize] = true;
    }
    if let Some(missing) = seen.iter().position(|&hit| !hit) {
        return Err(err(format!("dense capture slot {missing} has no external slot mapped to it")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capture::CaptureState;
    use crate::core::nodes::{NodeFlags, RegexNode};
    use crate::core::options::Options;
    use crate::core::writer::write;

    fn simple_program() -> RegexCode {
        let tree = RegexNode::Capture {
            slot: 0,
            uncap: None,
            child: Box::new(RegexNode::One { ch: 'a', flags: NodeFlags::none() }),
        };
        write(&tree, &CaptureState::new(), &Options::new())
    }

    #[test]
    fn well_formed_program_validates() {
        assert!(validate(&simple_program()).is_ok());
    }

    #[test]
    fn out_of_range_jump_is_rejected() {
        let mut code = simple_program();
        let len = code.codes.len();
        code.codes.push(Inst::Goto { target: len + 5 });
        assert!(validate(&code).is_err());
    }

    #[test]
    fn out_of_range_string_index_is_rejected() {
        let mut code = simple_program();
        code.codes.push(Inst::Set { str_idx: code.strings.len() + 1, flags: Default::default() });
        assert!(validate(&code).is_err());
    }

    #[test]
    fn non_total_capture_remap_is_rejected() {
        let mut code = simple_program();
        code.cap_size = 2;
        assert!(validate(&code).is_err());
    }
}
