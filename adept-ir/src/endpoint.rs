// Function endpoints
// An endpoint identifies one callable as a pair of AST function id and
// IR function id. Polymorphic endpoints have no IR function yet.

use adept_ast::FuncId;

pub type IrFuncId = usize;

/// One callable: the AST function and, for concretes, its IR function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuncEndpoint {
    pub ast_func_id: FuncId,
    /// `None` marks a polymorphic endpoint awaiting instantiation
    pub ir_func_id: Option<IrFuncId>,
}

impl FuncEndpoint {
    pub fn concrete(ast_func_id: FuncId, ir_func_id: IrFuncId) -> Self {
        Self {
            ast_func_id,
            ir_func_id: Some(ir_func_id),
        }
    }

    pub fn polymorphic(ast_func_id: FuncId) -> Self {
        Self {
            ast_func_id,
            ir_func_id: None,
        }
    }

    pub fn is_polymorphic(&self) -> bool {
        self.ir_func_id.is_none()
    }
}

/// A fully-resolved callable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuncPair {
    pub ast_func_id: FuncId,
    pub ir_func_id: IrFuncId,
}

impl FuncPair {
    pub fn new(ast_func_id: FuncId, ir_func_id: IrFuncId) -> Self {
        Self {
            ast_func_id,
            ir_func_id,
        }
    }
}

fn endpoint_ordering(a: &FuncEndpoint, b: &FuncEndpoint) -> std::cmp::Ordering {
    // Prefer non-polymorphic functions before polymorphic ones,
    // then functions in the order they were defined
    a.is_polymorphic()
        .cmp(&b.is_polymorphic())
        .then(a.ast_func_id.cmp(&b.ast_func_id))
}

/// Insert an endpoint keeping the list sorted by the overload tie-break
/// policy: non-polymorphic first, then ascending ast_func_id
pub fn endpoint_list_insert(endpoints: &mut Vec<FuncEndpoint>, endpoint: FuncEndpoint) {
    let position = endpoints
        .binary_search_by(|existing| endpoint_ordering(existing, &endpoint))
        .unwrap_or_else(|insert_at| insert_at);

    endpoints.insert(position, endpoint);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_policy() {
        let mut endpoints = Vec::new();
        endpoint_list_insert(&mut endpoints, FuncEndpoint::polymorphic(1));
        endpoint_list_insert(&mut endpoints, FuncEndpoint::concrete(5, 10));
        endpoint_list_insert(&mut endpoints, FuncEndpoint::concrete(2, 7));
        endpoint_list_insert(&mut endpoints, FuncEndpoint::polymorphic(0));

        let order: Vec<(FuncId, bool)> = endpoints
            .iter()
            .map(|e| (e.ast_func_id, e.is_polymorphic()))
            .collect();

        assert_eq!(order, vec![(2, false), (5, false), (0, true), (1, true)]);
    }

    #[test]
    fn test_sorted_after_any_sequence() {
        let mut endpoints = Vec::new();
        for i in (0..8).rev() {
            let endpoint = if i % 2 == 0 {
                FuncEndpoint::concrete(i, i)
            } else {
                FuncEndpoint::polymorphic(i)
            };
            endpoint_list_insert(&mut endpoints, endpoint);
        }

        for window in endpoints.windows(2) {
            assert_ne!(
                endpoint_ordering(&window[0], &window[1]),
                std::cmp::Ordering::Greater
            );
        }
    }
}
