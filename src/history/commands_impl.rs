// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Triton-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Triton and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

/// Per-command execute/undo implementations used by `Command`.
/// Keeps `history::mod` focused on the public types and the stack engine.
fn execute_insert(
    document: &mut Document,
    position: &mut InsertPosition,
    cell: &Cell,
) -> Result<String, CommandError> {
    let len = document.len();
    let index = match *position {
        InsertPosition::Append => len,
        InsertPosition::At(index) => index,
    };
    if index > len {
        return Err(CommandError::IndexOutOfRange { index, len });
    }
    if document.contains_cell_id(cell.cell_id()) {
        return Err(CommandError::DuplicateCellId {
            cell_id: cell.cell_id().clone(),
        });
    }

    document.cells_mut().insert(index, cell.clone());
    // Undo must operate on the realized index, not the append sentinel.
    *position = InsertPosition::At(index);

    Ok(format!("Inserted {} cell at index {index}", cell.kind()))
}

fn undo_insert(
    document: &mut Document,
    position: &InsertPosition,
    cell: &Cell,
) -> Result<String, CommandError> {
    let InsertPosition::At(index) = *position else {
        return Err(CommandError::NotExecuted);
    };
    let len = document.len();
    if index >= len {
        return Err(CommandError::IndexOutOfRange { index, len });
    }

    document.cells_mut().remove(index);

    Ok(format!("Undid insert of {} cell at index {index}", cell.kind()))
}

fn execute_delete(
    document: &mut Document,
    indices: &[usize],
    removed: &mut Vec<RemovedCell>,
) -> Result<String, CommandError> {
    let len = document.len();

    let mut sorted = indices.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if let Some(&index) = sorted.iter().find(|&&index| index >= len) {
        return Err(CommandError::IndexOutOfRange { index, len });
    }

    // Remove in descending order so earlier removals never shift a pending
    // smaller index.
    sorted.reverse();
    removed.clear();
    for index in sorted {
        let cell = document.cells_mut().remove(index);
        removed.push(RemovedCell { index, cell });
    }

    Ok(format!("Deleted {} cell(s)", removed.len()))
}

fn undo_delete(
    document: &mut Document,
    removed: &[RemovedCell],
) -> Result<String, CommandError> {
    if removed.is_empty() {
        return Err(CommandError::NotExecuted);
    }

    // `removed` holds descending pre-deletion indices; restoring in reverse
    // (ascending) puts each cell back at the index it originally occupied
    // once the earlier insertions have shifted the sequence into place.
    let mut len = document.len();
    for item in removed.iter().rev() {
        if item.index > len {
            return Err(CommandError::IndexOutOfRange {
                index: item.index,
                len,
            });
        }
        len += 1;
    }

    for item in removed.iter().rev() {
        document.cells_mut().insert(item.index, item.cell.clone());
    }

    Ok(format!("Restored {} deleted cell(s)", removed.len()))
}

fn execute_update(
    document: &mut Document,
    index: usize,
    field: CellField,
    prior: &mut Option<CellValue>,
    value: &CellValue,
) -> Result<String, CommandError> {
    let len = document.len();
    let Some(cell) = document.cell_mut(index) else {
        return Err(CommandError::IndexOutOfRange { index, len });
    };

    if prior.is_none() {
        *prior = Some(cell.field(field));
    }
    cell.set_field(field, value)?;

    Ok(format!("Updated cell [{index}] {field}"))
}

fn undo_update(
    document: &mut Document,
    index: usize,
    field: CellField,
    prior: &Option<CellValue>,
) -> Result<String, CommandError> {
    let Some(prior) = prior else {
        return Err(CommandError::NotExecuted);
    };
    let len = document.len();
    let Some(cell) = document.cell_mut(index) else {
        return Err(CommandError::IndexOutOfRange { index, len });
    };

    cell.set_field(field, prior)?;

    Ok(format!("Restored cell [{index}] {field} to previous value"))
}

fn execute_move(
    document: &mut Document,
    from_index: usize,
    to_index: usize,
) -> Result<String, CommandError> {
    let len = document.len();
    if from_index >= len {
        return Err(CommandError::IndexOutOfRange {
            index: from_index,
            len,
        });
    }
    if to_index >= len {
        return Err(CommandError::IndexOutOfRange { index: to_index, len });
    }

    // `to_index` is interpreted against the sequence after removal.
    let cell = document.cells_mut().remove(from_index);
    document.cells_mut().insert(to_index, cell);

    Ok(format!("Moved cell from [{from_index}] to [{to_index}]"))
}

fn undo_move(
    document: &mut Document,
    from_index: usize,
    to_index: usize,
) -> Result<String, CommandError> {
    let len = document.len();
    if to_index >= len {
        return Err(CommandError::IndexOutOfRange { index: to_index, len });
    }
    if from_index >= len {
        return Err(CommandError::IndexOutOfRange {
            index: from_index,
            len,
        });
    }

    let cell = document.cells_mut().remove(to_index);
    document.cells_mut().insert(from_index, cell);

    Ok(format!("Moved cell back from [{to_index}] to [{from_index}]"))
}

fn execute_swap(
    document: &mut Document,
    first: usize,
    second: usize,
) -> Result<String, CommandError> {
    let len = document.len();
    if first >= len {
        return Err(CommandError::IndexOutOfRange { index: first, len });
    }
    if second >= len {
        return Err(CommandError::IndexOutOfRange { index: second, len });
    }

    document.cells_mut().swap(first, second);

    Ok(format!("Swapped cells [{first}] and [{second}]"))
}

fn execute_reorder(
    document: &mut Document,
    old_order: &mut Option<Vec<usize>>,
    new_order: &[usize],
) -> Result<String, CommandError> {
    let len = document.len();
    validate_permutation(new_order, len)?;

    if old_order.is_none() {
        *old_order = Some((0..len).collect());
    }

    let old_cells = document.cells().to_vec();
    *document.cells_mut() = new_order.iter().map(|&index| old_cells[index].clone()).collect();

    Ok(format!("Reordered {len} cells"))
}

fn undo_reorder(
    document: &mut Document,
    old_order: &Option<Vec<usize>>,
    new_order: &[usize],
) -> Result<String, CommandError> {
    let Some(old_order) = old_order else {
        return Err(CommandError::NotExecuted);
    };
    let len = document.len();
    validate_permutation(new_order, len)?;
    validate_permutation(old_order, len)?;

    // After the reorder, old index `i` sits at `inverse[i]`; walking
    // `old_order` through the inverse recovers the pre-reorder sequence.
    let mut inverse = vec![0usize; len];
    for (position, &old_index) in new_order.iter().enumerate() {
        inverse[old_index] = position;
    }

    let current = document.cells().to_vec();
    *document.cells_mut() = old_order
        .iter()
        .map(|&index| current[inverse[index]].clone())
        .collect();

    Ok("Restored previous cell order".to_owned())
}

/// An order is valid only if it is a permutation of exactly `[0, len)`:
/// same length, no duplicates, no omissions.
fn validate_permutation(order: &[usize], len: usize) -> Result<(), CommandError> {
    if order.len() != len {
        return Err(CommandError::OrderLengthMismatch {
            expected: len,
            found: order.len(),
        });
    }

    let mut seen = vec![false; len];
    for &index in order {
        if index >= len {
            return Err(CommandError::OrderIndexOutOfRange { index, len });
        }
        if seen[index] {
            return Err(CommandError::OrderDuplicateIndex { index });
        }
        seen[index] = true;
    }

    Ok(())
}
