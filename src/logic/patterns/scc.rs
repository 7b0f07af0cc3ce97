//! Iterative Tarjan strongly connected components (no recursion, O(V + E)).

use super::graph::TransactionGraph;

const UNVISITED: usize = usize::MAX;

pub fn strongly_connected_components(graph: &TransactionGraph) -> Vec<Vec<usize>> {
    let n = graph.node_count();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut components: Vec<Vec<usize>> = Vec::new();
    let mut next_index = 0usize;

    // (node, next successor position)
    let mut call_stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }

        index[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        call_stack.push((root, 0));

        while let Some(frame) = call_stack.last_mut() {
            let v = frame.0;
            let succ = graph.successors(v);

            if frame.1 < succ.len() {
                let w = succ[frame.1];
                frame.1 += 1;

                if index[w] == UNVISITED {
                    index[w] = next_index;
                    lowlink[w] = next_index;
                    next_index += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    call_stack.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
                continue;
            }

            call_stack.pop();
            if let Some(&(parent, _)) = call_stack.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }

            if lowlink[v] == index[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                components.push(component);
            }
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::transaction::Transaction;
    use chrono::Utc;

    fn graph(edges: &[(&str, &str)]) -> TransactionGraph {
        let now = Utc::now();
        let txs: Vec<_> = edges
            .iter()
            .enumerate()
            .map(|(i, (s, r))| Transaction::new(format!("t{i}"), *s, *r, 1.0, now))
            .collect();
        TransactionGraph::from_transactions(&txs)
    }

    fn sizes(g: &TransactionGraph) -> Vec<usize> {
        let mut s: Vec<_> = strongly_connected_components(g).iter().map(|c| c.len()).collect();
        s.sort_unstable();
        s
    }

    #[test]
    fn test_cycle_and_tail() {
        let g = graph(&[("a", "b"), ("b", "c"), ("c", "a"), ("c", "d")]);
        assert_eq!(sizes(&g), vec![1, 3]);
    }

    #[test]
    fn test_two_cycles_joined_one_way() {
        let g = graph(&[("a", "b"), ("b", "a"), ("b", "c"), ("c", "d"), ("d", "c")]);
        assert_eq!(sizes(&g), vec![2, 2]);
    }

    #[test]
    fn test_chain_is_all_singletons() {
        let g = graph(&[("a", "b"), ("b", "c"), ("c", "d")]);
        assert_eq!(sizes(&g), vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_long_cycle_no_recursion_limit() {
        let ids: Vec<String> = (0..50_000).map(|i| format!("n{i}")).collect();
        let now = Utc::now();
        let txs: Vec<_> = (0..ids.len())
            .map(|i| Transaction::new(format!("t{i}"), ids[i].as_str(), ids[(i + 1) % ids.len()].as_str(), 1.0, now))
            .collect();
        let g = TransactionGraph::from_transactions(&txs);
        assert_eq!(sizes(&g), vec![50_000]);
    }
}
