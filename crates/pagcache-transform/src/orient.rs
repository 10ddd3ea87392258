//! MAG → PAG: FCI orientation with the MAG as the independence oracle.
//!
//! Starts from the MAG skeleton with every endpoint a circle, copies the
//! MAG's unshielded colliders (R0), then applies Zhang's rules R1–R4 to a
//! fixed point and R8–R10 to a fixed point. R5–R7 only fire with selection
//! variables, which are not modelled here.
//!
//! Throughout, `g.mark(a, b)` is the mark at `b` on the edge `a *-* b`.

use std::collections::HashSet;
use std::collections::VecDeque;

use pagcache_graph::{Endpoint, Graph, NodeId};
use tracing::{debug, trace};

/// Build the PAG for a MAG.
pub fn mag_to_pag(mag: &Graph) -> Graph {
    // A clone keeps node indices, so ids are shared between `mag` and `pag`.
    let mut pag = mag.clone();
    pag.reorient_all(Endpoint::Circle);

    rule_r0(&mut pag, mag);

    let mut epochs = 0usize;
    loop {
        epochs += 1;
        let mut changed = rules_r1_r2(&mut pag);
        changed |= rule_r3(&mut pag);
        changed |= rule_r4(&mut pag, mag);
        if !changed {
            break;
        }
    }

    loop {
        epochs += 1;
        if !rules_r8_r9_r10(&mut pag) {
            break;
        }
    }

    debug!(
        nodes = pag.node_count(),
        edges = pag.edge_count(),
        epochs,
        "PAG orientation finished"
    );
    pag
}

fn is(g: &Graph, from: NodeId, to: NodeId, e: Endpoint) -> bool {
    g.mark(from, to) == Some(e)
}

fn orient(g: &mut Graph, from: NodeId, to: NodeId, e: Endpoint, rule: &str) {
    if g.set_mark(from, to, e) {
        trace!(
            "{rule}: mark at {} on {} *-* {} set to {e}",
            g.name_of(to).unwrap_or("?"),
            g.name_of(from).unwrap_or("?"),
            g.name_of(to).unwrap_or("?"),
        );
    }
}

/// Unordered pairs of distinct neighbours of `b`.
fn neighbour_pairs(g: &Graph, b: NodeId) -> Vec<(NodeId, NodeId)> {
    let adj = g.adjacent_ids(b);
    let mut pairs = Vec::new();
    for i in 0..adj.len() {
        for j in i + 1..adj.len() {
            pairs.push((adj[i], adj[j]));
        }
    }
    pairs
}

/// R0: unshielded colliders in the MAG are colliders in the PAG.
fn rule_r0(pag: &mut Graph, mag: &Graph) {
    for b in pag.node_ids() {
        for (a, c) in neighbour_pairs(pag, b) {
            if pag.is_adjacent_ids(a, c) {
                continue;
            }
            if is(mag, a, b, Endpoint::Arrow) && is(mag, c, b, Endpoint::Arrow) {
                orient(pag, a, b, Endpoint::Arrow, "R0");
                orient(pag, c, b, Endpoint::Arrow, "R0");
            }
        }
    }
}

fn rules_r1_r2(g: &mut Graph) -> bool {
    let mut changed = false;
    for b in g.node_ids() {
        for (a, c) in neighbour_pairs(g, b) {
            changed |= rule_r1(g, a, b, c);
            changed |= rule_r1(g, c, b, a);
            changed |= rule_r2(g, a, b, c);
            changed |= rule_r2(g, c, b, a);
        }
    }
    changed
}

/// R1: `a *-> b o-* c`, `a`, `c` non-adjacent ⇒ `b --> c`.
fn rule_r1(g: &mut Graph, a: NodeId, b: NodeId, c: NodeId) -> bool {
    if g.is_adjacent_ids(a, c) {
        return false;
    }
    if is(g, a, b, Endpoint::Arrow) && is(g, c, b, Endpoint::Circle) {
        orient(g, c, b, Endpoint::Tail, "R1");
        orient(g, b, c, Endpoint::Arrow, "R1");
        return true;
    }
    false
}

/// R2: `a --> b *-> c` or `a *-> b --> c`, and `a *-o c` ⇒ `a *-> c`.
fn rule_r2(g: &mut Graph, a: NodeId, b: NodeId, c: NodeId) -> bool {
    if !is(g, a, c, Endpoint::Circle) {
        return false;
    }
    let into_b = is(g, a, b, Endpoint::Arrow);
    let into_c = is(g, b, c, Endpoint::Arrow);
    let tail_at_a = is(g, b, a, Endpoint::Tail);
    let tail_at_b = is(g, c, b, Endpoint::Tail);
    if into_b && into_c && (tail_at_a || tail_at_b) {
        orient(g, a, c, Endpoint::Arrow, "R2");
        return true;
    }
    false
}

/// R3: `a *-> b <-* c`, `a *-o d o-* c`, `a`, `c` non-adjacent, `d *-o b` ⇒ `d *-> b`.
fn rule_r3(g: &mut Graph) -> bool {
    let mut changed = false;
    for b in g.node_ids() {
        let adj = g.adjacent_ids(b);
        for &d in &adj {
            if !is(g, d, b, Endpoint::Circle) {
                continue;
            }
            let oriented = neighbour_pairs(g, b).into_iter().any(|(a, c)| {
                a != d
                    && c != d
                    && !g.is_adjacent_ids(a, c)
                    && is(g, a, b, Endpoint::Arrow)
                    && is(g, c, b, Endpoint::Arrow)
                    && is(g, a, d, Endpoint::Circle)
                    && is(g, c, d, Endpoint::Circle)
            });
            if oriented {
                orient(g, d, b, Endpoint::Arrow, "R3");
                changed = true;
            }
        }
    }
    changed
}

/// R4: for a discriminating path `<θ, ..., a, b, c>` with `b o-* c`, orient
/// `a <-> b <-> c` when `b` is a collider in the MAG and `b --> c` otherwise.
fn rule_r4(g: &mut Graph, mag: &Graph) -> bool {
    let mut changed = false;
    for c in g.node_ids() {
        for b in g.adjacent_ids(c) {
            if !is(g, c, b, Endpoint::Circle) {
                continue;
            }
            for a in g.adjacent_ids(b) {
                if a == c || !g.is_adjacent_ids(a, c) {
                    continue;
                }
                if !g.is_parent_of(a, c) || !is(g, b, a, Endpoint::Arrow) {
                    continue;
                }
                if !has_discriminating_path(g, a, b, c) {
                    continue;
                }
                if is(mag, a, b, Endpoint::Arrow) && is(mag, c, b, Endpoint::Arrow) {
                    orient(g, a, b, Endpoint::Arrow, "R4");
                    orient(g, c, b, Endpoint::Arrow, "R4");
                    orient(g, b, c, Endpoint::Arrow, "R4");
                } else {
                    orient(g, c, b, Endpoint::Tail, "R4");
                    orient(g, b, c, Endpoint::Arrow, "R4");
                }
                changed = true;
                break;
            }
        }
    }
    changed
}

/// Search backwards from `a` for a `θ` not adjacent to `c`, through nodes
/// that are colliders on the path and parents of `c`.
fn has_discriminating_path(g: &Graph, a: NodeId, b: NodeId, c: NodeId) -> bool {
    let mut visited: HashSet<NodeId> = HashSet::from([a, b, c]);
    let mut queue = VecDeque::from([a]);

    while let Some(v) = queue.pop_front() {
        for w in g.adjacent_ids(v) {
            if visited.contains(&w) || !is(g, w, v, Endpoint::Arrow) {
                continue;
            }
            if !g.is_adjacent_ids(w, c) {
                return true;
            }
            if g.is_parent_of(w, c) && is(g, v, w, Endpoint::Arrow) {
                visited.insert(w);
                queue.push_back(w);
            }
        }
    }
    false
}

fn rules_r8_r9_r10(g: &mut Graph) -> bool {
    let mut changed = false;
    for c in g.node_ids() {
        for a in g.adjacent_ids(c) {
            if !is_partially_oriented(g, a, c) {
                continue;
            }
            if rule_r8(g, a, c) || rule_r9(g, a, c) || rule_r10(g, a, c) {
                changed = true;
            }
        }
    }
    changed
}

/// `a o-> c`
fn is_partially_oriented(g: &Graph, a: NodeId, c: NodeId) -> bool {
    is(g, c, a, Endpoint::Circle) && is(g, a, c, Endpoint::Arrow)
}

/// R8: `a --> b --> c` or `a -o b --> c`, and `a o-> c` ⇒ `a --> c`.
fn rule_r8(g: &mut Graph, a: NodeId, c: NodeId) -> bool {
    let common: Vec<NodeId> = g
        .adjacent_ids(a)
        .into_iter()
        .filter(|&b| b != c && g.is_adjacent_ids(b, c))
        .collect();
    for b in common {
        let a_side = is(g, b, a, Endpoint::Tail)
            && (is(g, a, b, Endpoint::Arrow) || is(g, a, b, Endpoint::Circle));
        if a_side && g.is_parent_of(b, c) {
            orient(g, c, a, Endpoint::Tail, "R8");
            return true;
        }
    }
    false
}

/// R9: `a o-> c` and an uncovered potentially directed path
/// `<a, b, θ, ..., c>` with `b`, `c` non-adjacent ⇒ `a --> c`.
fn rule_r9(g: &mut Graph, a: NodeId, c: NodeId) -> bool {
    for b in g.adjacent_ids(a) {
        if b == c || g.is_adjacent_ids(b, c) || !potentially_directed(g, a, b) {
            continue;
        }
        let mut on_path = HashSet::from([a, b]);
        if uncovered_pd_path(g, a, b, c, &mut on_path) {
            orient(g, c, a, Endpoint::Tail, "R9");
            return true;
        }
    }
    false
}

/// R10: `a o-> c`, `b --> c <-- θ`, uncovered potentially directed paths
/// from `a` to `b` and to `θ` whose first steps `μ`, `ω` are distinct and
/// non-adjacent ⇒ `a --> c`.
fn rule_r10(g: &mut Graph, a: NodeId, c: NodeId) -> bool {
    let into: Vec<NodeId> = g
        .parent_ids(c)
        .into_iter()
        .filter(|&p| p != a)
        .collect();
    if into.len() < 2 {
        return false;
    }

    let first_steps = |g: &Graph, target: NodeId| -> Vec<NodeId> {
        g.adjacent_ids(a)
            .into_iter()
            .filter(|&hop| {
                if !potentially_directed(g, a, hop) {
                    return false;
                }
                if hop == target {
                    return true;
                }
                let mut on_path = HashSet::from([a, hop]);
                uncovered_pd_path(g, a, hop, target, &mut on_path)
            })
            .collect()
    };

    for i in 0..into.len() {
        for j in i + 1..into.len() {
            let mus = first_steps(&*g, into[i]);
            if mus.is_empty() {
                continue;
            }
            let omegas = first_steps(&*g, into[j]);
            let found = mus.iter().any(|&mu| {
                omegas
                    .iter()
                    .any(|&omega| mu != omega && !g.is_adjacent_ids(mu, omega))
            });
            if found {
                orient(g, c, a, Endpoint::Tail, "R10");
                return true;
            }
        }
    }
    false
}

/// The edge `u *-* v` is neither into `u` nor out of `v`.
fn potentially_directed(g: &Graph, u: NodeId, v: NodeId) -> bool {
    g.is_adjacent_ids(u, v) && !is(g, v, u, Endpoint::Arrow) && !is(g, u, v, Endpoint::Tail)
}

/// Extend the path `..., prev, curr` to `target`, keeping every consecutive
/// triple unshielded and every step potentially directed.
fn uncovered_pd_path(
    g: &Graph,
    prev: NodeId,
    curr: NodeId,
    target: NodeId,
    on_path: &mut HashSet<NodeId>,
) -> bool {
    for next in g.adjacent_ids(curr) {
        if on_path.contains(&next) || g.is_adjacent_ids(prev, next) {
            continue;
        }
        if !potentially_directed(g, curr, next) {
            continue;
        }
        if next == target {
            return true;
        }
        on_path.insert(next);
        if uncovered_pd_path(g, curr, next, target, on_path) {
            return true;
        }
        on_path.remove(&next);
    }
    false
}
