//! Maximum-cardinality, maximum-weight matching on general graphs.
//!
//! Edmonds' blossom method in Galil's O(n^3) primal-dual form. Integer
//! weights keep every dual value integral, so no floating point is involved.
//!
//! ## Terms
//!
//! - Endpoint `p` of edge `k`: `2k` is its first vertex, `2k + 1` its second;
//!   `p ^ 1` is the opposite end
//! - Blossom ids: `0..n` are single vertices, `n..2n` are contracted odd cycles
//! - Outer (S) and inner (T) labels mark alternating-tree layers

use crate::error::{Result, ScheduleError};

const NONE: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Free,
    Outer,
    Inner,
    /// Temporary mark while walking two tree paths towards their meeting point.
    Breadcrumb,
}

enum DualStep {
    /// No further progress possible in this stage.
    Stop,
    /// An edge from an outer vertex to a free vertex became tight.
    Grow(usize),
    /// An edge between two outer blossoms became tight.
    Shrink(usize),
    /// An inner blossom's dual reached zero.
    Expand(usize),
}

/// Mate of every vertex in a maximum-cardinality matching of maximum weight.
///
/// `edges` are `(a, b, weight)` with `a != b`, both `< nb_vertex`.
pub(crate) fn max_weight_matching(
    nb_vertex: usize,
    edges: &[(usize, usize, i128)],
) -> Result<Vec<Option<usize>>> {
    if let Some((a, b, _)) = edges
        .iter()
        .find(|(a, b, _)| a == b || *a >= nb_vertex || *b >= nb_vertex)
    {
        return Err(ScheduleError::invalid(format!(
            "matching edge ({}, {}) is a loop or outside 0..{}",
            a, b, nb_vertex
        )));
    }
    Matcher::new(nb_vertex, edges).solve()
}

struct Matcher<'e> {
    n: usize,
    edges: &'e [(usize, usize, i128)],
    /// Vertex at each endpoint.
    endpoint: Vec<usize>,
    /// Remote endpoints of the edges incident to each vertex.
    neighbend: Vec<Vec<usize>>,
    /// Remote endpoint of each vertex's matched edge.
    mate: Vec<usize>,
    label: Vec<Label>,
    /// Endpoint through which a blossom got its label.
    label_end: Vec<usize>,
    /// Top-level blossom containing each vertex.
    in_blossom: Vec<usize>,
    parent: Vec<usize>,
    /// Sub-blossoms in cycle order, starting at the base.
    children: Vec<Vec<usize>>,
    base: Vec<usize>,
    /// `endps[b][i]` joins `children[b][i]` to `children[b][i + 1]`.
    endps: Vec<Vec<usize>>,
    /// Least-slack edge to a different outer blossom, per blossom.
    best_edge: Vec<usize>,
    /// Least-slack edges to each neighbouring outer blossom, per outer blossom.
    best_edges: Vec<Option<Vec<usize>>>,
    unused: Vec<usize>,
    dual: Vec<i128>,
    /// Edges known to have zero slack.
    allowed: Vec<bool>,
    queue: Vec<usize>,
}

impl<'e> Matcher<'e> {
    fn new(n: usize, edges: &'e [(usize, usize, i128)]) -> Self {
        let max_weight = edges.iter().map(|(_, _, w)| *w).max().unwrap_or(0).max(0);
        let endpoint = (0..2 * edges.len())
            .map(|p| {
                let (a, b, _) = edges[p / 2];
                if p % 2 == 0 {
                    a
                } else {
                    b
                }
            })
            .collect();
        let mut neighbend = vec![Vec::new(); n];
        for (k, (a, b, _)) in edges.iter().enumerate() {
            neighbend[*a].push(2 * k + 1);
            neighbend[*b].push(2 * k);
        }
        let mut dual = vec![max_weight; n];
        dual.extend(std::iter::repeat(0).take(n));

        Self {
            n,
            edges,
            endpoint,
            neighbend,
            mate: vec![NONE; n],
            label: vec![Label::Free; 2 * n],
            label_end: vec![NONE; 2 * n],
            in_blossom: (0..n).collect(),
            parent: vec![NONE; 2 * n],
            children: vec![Vec::new(); 2 * n],
            base: (0..n).chain(std::iter::repeat(NONE).take(n)).collect(),
            endps: vec![Vec::new(); 2 * n],
            best_edge: vec![NONE; 2 * n],
            best_edges: vec![None; 2 * n],
            unused: (n..2 * n).collect(),
            dual,
            allowed: vec![false; edges.len()],
            queue: Vec::new(),
        }
    }

    fn slack(&self, k: usize) -> i128 {
        let (a, b, w) = self.edges[k];
        self.dual[a] + self.dual[b] - 2 * w
    }

    fn leaves(&self, b: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![b];
        while let Some(t) = stack.pop() {
            if t < self.n {
                out.push(t);
            } else {
                stack.extend(self.children[t].iter().rev().copied());
            }
        }
        out
    }

    fn assign_label(&mut self, w: usize, label: Label, p: usize) {
        let b = self.in_blossom[w];
        self.label[w] = label;
        self.label[b] = label;
        self.label_end[w] = p;
        self.label_end[b] = p;
        self.best_edge[w] = NONE;
        self.best_edge[b] = NONE;
        match label {
            Label::Outer => {
                let leaves = self.leaves(b);
                self.queue.extend(leaves);
            }
            Label::Inner => {
                // The base of an inner blossom is matched; its mate turns outer.
                let m = self.mate[self.base[b]];
                self.assign_label(self.endpoint[m], Label::Outer, m ^ 1);
            }
            Label::Free | Label::Breadcrumb => {}
        }
    }

    /// Base of the blossom closed by a tight S-S edge, or `NONE` for an augmenting path.
    fn scan_blossom(&mut self, mut v: usize, mut w: usize) -> usize {
        let mut path = Vec::new();
        let mut base = NONE;
        while v != NONE || w != NONE {
            let mut b = self.in_blossom[v];
            if self.label[b] == Label::Breadcrumb {
                base = self.base[b];
                break;
            }
            path.push(b);
            self.label[b] = Label::Breadcrumb;
            if self.label_end[b] == NONE {
                v = NONE;
            } else {
                v = self.endpoint[self.label_end[b]];
                b = self.in_blossom[v];
                v = self.endpoint[self.label_end[b]];
            }
            if w != NONE {
                std::mem::swap(&mut v, &mut w);
            }
        }
        for b in path {
            self.label[b] = Label::Outer;
        }
        base
    }

    fn add_blossom(&mut self, base: usize, k: usize) -> Result<()> {
        let (mut v, mut w, _) = self.edges[k];
        let bb = self.in_blossom[base];
        let mut bv = self.in_blossom[v];
        let mut bw = self.in_blossom[w];
        let b = self
            .unused
            .pop()
            .ok_or_else(|| ScheduleError::invariant("blossom ids exhausted"))?;

        self.base[b] = base;
        self.parent[b] = NONE;
        self.parent[bb] = b;

        let mut path = Vec::new();
        let mut endps = Vec::new();
        while bv != bb {
            self.parent[bv] = b;
            path.push(bv);
            endps.push(self.label_end[bv]);
            v = self.endpoint[self.label_end[bv]];
            bv = self.in_blossom[v];
        }
        path.push(bb);
        path.reverse();
        endps.reverse();
        endps.push(2 * k);
        while bw != bb {
            self.parent[bw] = b;
            path.push(bw);
            endps.push(self.label_end[bw] ^ 1);
            w = self.endpoint[self.label_end[bw]];
            bw = self.in_blossom[w];
        }

        self.children[b] = path.clone();
        self.endps[b] = endps;
        self.label[b] = Label::Outer;
        self.label_end[b] = self.label_end[bb];
        self.dual[b] = 0;

        for leaf in self.leaves(b) {
            if self.label[self.in_blossom[leaf]] == Label::Inner {
                // Former inner vertices become outer and must be scanned.
                self.queue.push(leaf);
            }
            self.in_blossom[leaf] = b;
        }

        let mut best_to = vec![NONE; 2 * self.n];
        for &sub in &path {
            let lists: Vec<Vec<usize>> = match self.best_edges[sub].take() {
                Some(list) => vec![list],
                None => self
                    .leaves(sub)
                    .into_iter()
                    .map(|leaf| self.neighbend[leaf].iter().map(|p| p / 2).collect())
                    .collect(),
            };
            for k in lists.into_iter().flatten() {
                let (i, j, _) = self.edges[k];
                let j = if self.in_blossom[j] == b { i } else { j };
                let bj = self.in_blossom[j];
                if bj != b
                    && self.label[bj] == Label::Outer
                    && (best_to[bj] == NONE || self.slack(k) < self.slack(best_to[bj]))
                {
                    best_to[bj] = k;
                }
            }
            self.best_edge[sub] = NONE;
        }

        let list: Vec<usize> = best_to.into_iter().filter(|k| *k != NONE).collect();
        let mut best = NONE;
        for &k in &list {
            if best == NONE || self.slack(k) < self.slack(best) {
                best = k;
            }
        }
        self.best_edges[b] = Some(list);
        self.best_edge[b] = best;
        Ok(())
    }

    fn expand_blossom(&mut self, b: usize, end_stage: bool) -> Result<()> {
        let children = self.children[b].clone();
        for &s in &children {
            self.parent[s] = NONE;
            if s < self.n {
                self.in_blossom[s] = s;
            } else if end_stage && self.dual[s] == 0 {
                self.expand_blossom(s, end_stage)?;
            } else {
                for leaf in self.leaves(s) {
                    self.in_blossom[leaf] = s;
                }
            }
        }

        if !end_stage && self.label[b] == Label::Inner {
            // Relabel the even-length side of the cycle between the entry
            // child and the base so the alternating tree stays valid.
            let endps = self.endps[b].clone();
            let len = children.len() as isize;
            let at = |j: isize| j.rem_euclid(len) as usize;

            let entry = self.in_blossom[self.endpoint[self.label_end[b] ^ 1]];
            let pos = position(&children, entry)?;
            let (mut j, step, trick) = walk_direction(pos, len);

            let mut p = self.label_end[b];
            while j != 0 {
                self.label[self.endpoint[p ^ 1]] = Label::Free;
                let q = endps[at(j - trick as isize)];
                self.label[self.endpoint[q ^ trick ^ 1]] = Label::Free;
                self.assign_label(self.endpoint[p ^ 1], Label::Inner, p);
                self.allowed[q / 2] = true;
                j += step;
                p = endps[at(j - trick as isize)] ^ trick;
                self.allowed[p / 2] = true;
                j += step;
            }

            let bv = children[at(j)];
            let tip = self.endpoint[p ^ 1];
            self.label[tip] = Label::Inner;
            self.label[bv] = Label::Inner;
            self.label_end[tip] = p;
            self.label_end[bv] = p;
            self.best_edge[bv] = NONE;
            j += step;

            while children[at(j)] != entry {
                let bv = children[at(j)];
                j += step;
                if self.label[bv] == Label::Outer {
                    continue;
                }
                let reached = self
                    .leaves(bv)
                    .into_iter()
                    .find(|v| self.label[*v] != Label::Free);
                if let Some(v) = reached {
                    self.label[v] = Label::Free;
                    let m = self.mate[self.base[bv]];
                    self.label[self.endpoint[m]] = Label::Free;
                    self.assign_label(v, Label::Inner, self.label_end[v]);
                }
            }
        }

        self.label[b] = Label::Free;
        self.label_end[b] = NONE;
        self.children[b] = Vec::new();
        self.endps[b] = Vec::new();
        self.base[b] = NONE;
        self.best_edges[b] = None;
        self.best_edge[b] = NONE;
        self.unused.push(b);
        Ok(())
    }

    /// Swap matched and unmatched edges inside `b` so that `v` becomes its base.
    fn augment_blossom(&mut self, b: usize, v: usize) -> Result<()> {
        let mut t = v;
        while self.parent[t] != b {
            t = self.parent[t];
            if t == NONE {
                return Err(ScheduleError::invariant(format!(
                    "vertex {} is not inside blossom {}",
                    v, b
                )));
            }
        }
        if t >= self.n {
            self.augment_blossom(t, v)?;
        }

        let len = self.children[b].len() as isize;
        let at = |j: isize| j.rem_euclid(len) as usize;
        let i = position(&self.children[b], t)?;
        let (mut j, step, trick) = walk_direction(i, len);

        while j != 0 {
            j += step;
            let t = self.children[b][at(j)];
            let p = self.endps[b][at(j - trick as isize)] ^ trick;
            if t >= self.n {
                self.augment_blossom(t, self.endpoint[p])?;
            }
            j += step;
            let t = self.children[b][at(j)];
            if t >= self.n {
                self.augment_blossom(t, self.endpoint[p ^ 1])?;
            }
            self.mate[self.endpoint[p]] = p ^ 1;
            self.mate[self.endpoint[p ^ 1]] = p;
        }

        self.children[b].rotate_left(i);
        self.endps[b].rotate_left(i);
        self.base[b] = self.base[self.children[b][0]];
        Ok(())
    }

    /// Flip the augmenting path through tight edge `k`.
    fn augment_matching(&mut self, k: usize) -> Result<()> {
        let (v, w, _) = self.edges[k];
        for (mut s, mut p) in [(v, 2 * k + 1), (w, 2 * k)] {
            loop {
                let bs = self.in_blossom[s];
                if bs >= self.n {
                    self.augment_blossom(bs, s)?;
                }
                self.mate[s] = p;
                if self.label_end[bs] == NONE {
                    // Reached a tree root.
                    break;
                }
                let t = self.endpoint[self.label_end[bs]];
                let bt = self.in_blossom[t];
                s = self.endpoint[self.label_end[bt]];
                let j = self.endpoint[self.label_end[bt] ^ 1];
                if bt >= self.n {
                    self.augment_blossom(bt, j)?;
                }
                self.mate[j] = self.label_end[bt];
                p = self.label_end[bt] ^ 1;
            }
        }
        Ok(())
    }

    fn solve(mut self) -> Result<Vec<Option<usize>>> {
        let n = self.n;
        // Each stage either augments the matching by one edge or ends the search.
        for _ in 0..n {
            self.label.fill(Label::Free);
            self.best_edge.fill(NONE);
            for slot in &mut self.best_edges[n..] {
                *slot = None;
            }
            self.allowed.fill(false);
            self.queue.clear();

            for v in 0..n {
                if self.mate[v] == NONE && self.label[self.in_blossom[v]] == Label::Free {
                    self.assign_label(v, Label::Outer, NONE);
                }
            }

            let mut augmented = false;
            loop {
                while !augmented {
                    let Some(v) = self.queue.pop() else {
                        break;
                    };
                    for idx in 0..self.neighbend[v].len() {
                        let p = self.neighbend[v][idx];
                        let k = p / 2;
                        let w = self.endpoint[p];
                        if self.in_blossom[v] == self.in_blossom[w] {
                            continue;
                        }
                        let mut kslack = 0;
                        if !self.allowed[k] {
                            kslack = self.slack(k);
                            if kslack <= 0 {
                                self.allowed[k] = true;
                            }
                        }

                        let bw_label = self.label[self.in_blossom[w]];
                        if self.allowed[k] {
                            match bw_label {
                                Label::Free => self.assign_label(w, Label::Inner, p ^ 1),
                                Label::Outer => {
                                    let base = self.scan_blossom(v, w);
                                    if base != NONE {
                                        self.add_blossom(base, k)?;
                                    } else {
                                        self.augment_matching(k)?;
                                        augmented = true;
                                        break;
                                    }
                                }
                                Label::Inner | Label::Breadcrumb => {
                                    if self.label[w] == Label::Free {
                                        self.label[w] = Label::Inner;
                                        self.label_end[w] = p ^ 1;
                                    }
                                }
                            }
                        } else if bw_label == Label::Outer {
                            let b = self.in_blossom[v];
                            if self.best_edge[b] == NONE || kslack < self.slack(self.best_edge[b]) {
                                self.best_edge[b] = k;
                            }
                        } else if self.label[w] == Label::Free
                            && (self.best_edge[w] == NONE || kslack < self.slack(self.best_edge[w]))
                        {
                            self.best_edge[w] = k;
                        }
                    }
                }
                if augmented {
                    break;
                }

                let (delta, step) = self.dual_step();
                for v in 0..n {
                    match self.label[self.in_blossom[v]] {
                        Label::Outer => self.dual[v] -= delta,
                        Label::Inner => self.dual[v] += delta,
                        Label::Free | Label::Breadcrumb => {}
                    }
                }
                for b in n..2 * n {
                    if self.base[b] != NONE && self.parent[b] == NONE {
                        match self.label[b] {
                            Label::Outer => self.dual[b] += delta,
                            Label::Inner => self.dual[b] -= delta,
                            Label::Free | Label::Breadcrumb => {}
                        }
                    }
                }

                match step {
                    DualStep::Stop => break,
                    DualStep::Grow(k) => {
                        self.allowed[k] = true;
                        let (i, j, _) = self.edges[k];
                        let outer = if self.label[self.in_blossom[i]] == Label::Free { j } else { i };
                        self.queue.push(outer);
                    }
                    DualStep::Shrink(k) => {
                        self.allowed[k] = true;
                        self.queue.push(self.edges[k].0);
                    }
                    DualStep::Expand(b) => self.expand_blossom(b, false)?,
                }
            }

            if !augmented {
                break;
            }
            for b in n..2 * n {
                if self.parent[b] == NONE
                    && self.base[b] != NONE
                    && self.label[b] == Label::Outer
                    && self.dual[b] == 0
                {
                    self.expand_blossom(b, true)?;
                }
            }
        }

        Ok(self
            .mate
            .iter()
            .map(|&p| (p != NONE).then(|| self.endpoint[p]))
            .collect())
    }

    /// Smallest dual adjustment that makes progress, and what it unlocks.
    fn dual_step(&self) -> (i128, DualStep) {
        let n = self.n;
        let mut best: Option<(i128, DualStep)> = None;
        let mut consider = |delta: i128, step: DualStep| {
            if best.as_ref().map_or(true, |(current, _)| delta < *current) {
                best = Some((delta, step));
            }
        };

        for v in 0..n {
            if self.label[self.in_blossom[v]] == Label::Free && self.best_edge[v] != NONE {
                consider(self.slack(self.best_edge[v]), DualStep::Grow(self.best_edge[v]));
            }
        }
        for b in 0..2 * n {
            if self.parent[b] == NONE && self.label[b] == Label::Outer && self.best_edge[b] != NONE {
                // Slack between two outer vertices is even for integer weights.
                consider(self.slack(self.best_edge[b]) / 2, DualStep::Shrink(self.best_edge[b]));
            }
        }
        for b in n..2 * n {
            if self.base[b] != NONE && self.parent[b] == NONE && self.label[b] == Label::Inner {
                consider(self.dual[b], DualStep::Expand(b));
            }
        }

        best.unwrap_or_else(|| {
            let min_dual = self.dual[..n].iter().copied().min().unwrap_or(0);
            (min_dual.max(0), DualStep::Stop)
        })
    }
}

fn position(children: &[usize], child: usize) -> Result<usize> {
    children
        .iter()
        .position(|c| *c == child)
        .ok_or_else(|| ScheduleError::invariant(format!("blossom {} is not a sub-blossom", child)))
}

/// Start index, step and endpoint trick for walking a blossom cycle from
/// child `pos` to its base along the even-length side.
fn walk_direction(pos: usize, len: isize) -> (isize, isize, usize) {
    let j = pos as isize;
    if j & 1 == 1 {
        (j - len, 1, 0)
    } else {
        (j, -1, 1)
    }
}
