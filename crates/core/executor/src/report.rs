use std::{
    collections::{hash_map::Entry, HashMap},
    fmt::{Display, Formatter, Result as FmtResult},
    hash::Hash,
    ops::{Add, AddAssign},
};

use crate::Opcode;

/// An execution report.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// The opcode counts.
    pub opcode_counts: HashMap<Opcode, u64>,
    /// The function call counts, keyed by function name.
    pub function_counts: HashMap<String, u64>,
}

impl ExecutionReport {
    /// Compute the total number of instructions run during the execution.
    #[must_use]
    pub fn total_instruction_count(&self) -> u64 {
        self.opcode_counts.values().sum()
    }

    /// Compute the total number of function calls made during the execution.
    #[must_use]
    pub fn total_function_count(&self) -> u64 {
        self.function_counts.values().sum()
    }

    pub(crate) fn count_opcode(&mut self, opcode: Opcode) {
        *self.opcode_counts.entry(opcode).or_default() += 1;
    }

    pub(crate) fn count_function(&mut self, name: &str) {
        match self.function_counts.get_mut(name) {
            Some(count) => *count += 1,
            None => drop(self.function_counts.insert(name.to_string(), 1)),
        }
    }
}

/// Combines two `HashMap`s together. If a key is in both maps, the values are added together.
fn hashmap_add_assign<K, V>(lhs: &mut HashMap<K, V>, rhs: HashMap<K, V>)
where
    K: Eq + Hash,
    V: AddAssign,
{
    for (k, v) in rhs {
        // Can't use `.and_modify(...).or_insert(...)` because we want to use `v` in both places.
        match lhs.entry(k) {
            Entry::Occupied(e) => *e.into_mut() += v,
            Entry::Vacant(e) => drop(e.insert(v)),
        }
    }
}

/// Lines of `name  count`, largest count first, names padded to a common width.
fn sorted_table_lines<K: Display>(table: &HashMap<K, u64>) -> Vec<String> {
    let mut rows = table.iter().map(|(k, v)| (k.to_string(), *v)).collect::<Vec<_>>();
    rows.sort_unstable_by(|(ka, va), (kb, vb)| vb.cmp(va).then_with(|| ka.cmp(kb)));
    let width = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    rows.into_iter().map(|(k, v)| format!("{k:<width$}  {v}")).collect()
}

impl AddAssign for ExecutionReport {
    fn add_assign(&mut self, rhs: Self) {
        hashmap_add_assign(&mut self.opcode_counts, rhs.opcode_counts);
        hashmap_add_assign(&mut self.function_counts, rhs.function_counts);
    }
}

impl Add for ExecutionReport {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl Display for ExecutionReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        writeln!(f, "opcode counts ({} total instructions):", self.total_instruction_count())?;
        for line in sorted_table_lines(&self.opcode_counts) {
            writeln!(f, "  {line}")?;
        }

        writeln!(f, "function counts ({} total calls):", self.total_function_count())?;
        for line in sorted_table_lines(&self.function_counts) {
            writeln!(f, "  {line}")?;
        }

        Ok(())
    }
}
