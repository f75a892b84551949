//! Instruction planning and ordering validation
//!
//! A compiled workflow transaction always has this shape:
//! 1. `set_compute_unit_limit` (only when simulation produced an estimate)
//! 2. `set_compute_unit_price`
//! 3. node instructions, in node order
//!
//! Budget instructions that resolvers let through are stripped before
//! planning so the final list carries exactly one budget pair.

use solana_sdk::{
    compute_budget::{self, ComputeBudgetInstruction},
    instruction::Instruction,
};

use super::errors::CompileError;
use super::simulate::MAX_COMPUTE_UNIT_LIMIT;

/// Ordered instructions plus budget metadata
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionPlan {
    pub instructions: Vec<Instruction>,
    /// Unit limit placed at position 0, if any
    pub unit_limit: Option<u32>,
    pub unit_price: u64,
}

impl InstructionPlan {
    /// Number of leading budget instructions (1 or 2)
    pub fn budget_len(&self) -> usize {
        if self.unit_limit.is_some() {
            2
        } else {
            1
        }
    }

    /// Node instructions without the budget prefix
    pub fn body(&self) -> &[Instruction] {
        &self.instructions[self.budget_len().min(self.instructions.len())..]
    }
}

#[inline]
pub fn is_compute_budget_instruction(ix: &Instruction) -> bool {
    ix.program_id == compute_budget::id()
}

/// Remove compute-budget instructions; returns the rest and how many were removed
pub fn strip_compute_budget(instructions: Vec<Instruction>) -> (Vec<Instruction>, usize) {
    let before = instructions.len();
    let kept: Vec<Instruction> = instructions
        .into_iter()
        .filter(|ix| !is_compute_budget_instruction(ix))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}

/// Apply a headroom percentage to a simulated estimate, clamped to the
/// protocol maximum
pub fn unit_limit_with_margin(estimate: u64, margin_percent: u32) -> u32 {
    let padded = estimate.saturating_add(estimate.saturating_mul(margin_percent as u64) / 100);
    padded.min(MAX_COMPUTE_UNIT_LIMIT as u64) as u32
}

/// Prepend the budget pair to the node instructions
///
/// # Example
///
/// ```no_run
/// use solana_sdk::instruction::Instruction;
/// use solflow::tx_builder::plan_workflow_instructions;
///
/// # fn example(body: Vec<Instruction>) {
/// let plan = plan_workflow_instructions(Some(180_000), 100, body);
/// assert_eq!(plan.budget_len(), 2);
/// # }
/// ```
pub fn plan_workflow_instructions(
    unit_limit: Option<u32>,
    unit_price: u64,
    body: Vec<Instruction>,
) -> InstructionPlan {
    let mut instructions = Vec::with_capacity(body.len() + 2);
    if let Some(limit) = unit_limit {
        instructions.push(ComputeBudgetInstruction::set_compute_unit_limit(limit));
    }
    instructions.push(ComputeBudgetInstruction::set_compute_unit_price(unit_price));
    instructions.extend(body);

    InstructionPlan {
        instructions,
        unit_limit,
        unit_price,
    }
}

/// Validate budget placement (debug/test only)
///
/// Budget instructions must occupy exactly the leading one or two
/// positions, followed by at least one node instruction.
#[cfg(debug_assertions)]
pub fn sanity_check_ix_order(plan: &InstructionPlan) -> Result<(), CompileError> {
    let budget_len = plan.budget_len();
    if plan.instructions.len() <= budget_len {
        return Err(CompileError::invalid_order(
            "plan has no node instructions after the budget prefix",
        ));
    }

    for (idx, ix) in plan.instructions.iter().enumerate() {
        let is_budget = is_compute_budget_instruction(ix);
        if idx < budget_len && !is_budget {
            return Err(CompileError::invalid_order(format!(
                "expected compute-budget instruction at position {}, got program_id: {}",
                idx, ix.program_id
            )));
        }
        if idx >= budget_len && is_budget {
            return Err(CompileError::invalid_order(format!(
                "compute-budget instruction found among node instructions (at position {})",
                idx
            )));
        }
    }

    Ok(())
}

/// No-op version of sanity_check_ix_order for release builds
#[cfg(not(debug_assertions))]
#[inline]
pub fn sanity_check_ix_order(_plan: &InstructionPlan) -> Result<(), CompileError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey::Pubkey;

    fn node_ix() -> Instruction {
        Instruction::new_with_bytes(Pubkey::new_unique(), &[1], vec![])
    }

    #[test]
    fn test_plan_with_limit() {
        let body = vec![node_ix(), node_ix()];
        let plan = plan_workflow_instructions(Some(200_000), 100, body.clone());

        assert_eq!(plan.instructions.len(), 4);
        assert_eq!(
            plan.instructions[0],
            ComputeBudgetInstruction::set_compute_unit_limit(200_000)
        );
        assert_eq!(
            plan.instructions[1],
            ComputeBudgetInstruction::set_compute_unit_price(100)
        );
        assert_eq!(plan.body(), &body[..]);
        assert!(sanity_check_ix_order(&plan).is_ok());
    }

    #[test]
    fn test_plan_without_limit_keeps_price() {
        let plan = plan_workflow_instructions(None, 100, vec![node_ix()]);
        assert_eq!(plan.budget_len(), 1);
        assert_eq!(
            plan.instructions[0],
            ComputeBudgetInstruction::set_compute_unit_price(100)
        );
        assert!(sanity_check_ix_order(&plan).is_ok());
    }

    #[test]
    #[cfg(debug_assertions)]
    fn test_sanity_check_rejects_misplaced_budget() {
        let mut plan = plan_workflow_instructions(None, 100, vec![node_ix()]);
        plan.instructions
            .push(ComputeBudgetInstruction::set_compute_unit_limit(5));
        assert!(matches!(
            sanity_check_ix_order(&plan),
            Err(CompileError::InvalidInstructionOrder(_))
        ));

        let empty = plan_workflow_instructions(Some(1), 100, vec![]);
        assert!(sanity_check_ix_order(&empty).is_err());
    }

    #[test]
    fn test_strip_and_margin() {
        let body = vec![
            ComputeBudgetInstruction::set_compute_unit_limit(10),
            node_ix(),
            ComputeBudgetInstruction::set_compute_unit_price(5),
        ];
        let (kept, removed) = strip_compute_budget(body);
        assert_eq!(kept.len(), 1);
        assert_eq!(removed, 2);

        assert_eq!(unit_limit_with_margin(100_000, 0), 100_000);
        assert_eq!(unit_limit_with_margin(100_000, 20), 120_000);
        assert_eq!(unit_limit_with_margin(1_300_000, 50), MAX_COMPUTE_UNIT_LIMIT);
    }
}
