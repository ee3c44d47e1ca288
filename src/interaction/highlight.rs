use std::collections::HashSet;

/// The hovered node plus everything within two undirected hops of it,
/// walking only the given `(source, target)` edges.
pub fn two_hop_neighborhood<'a, I>(edges: I, hovered: &str) -> HashSet<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
    I::IntoIter: Clone,
{
    let edges = edges.into_iter();
    let mut first_hop = HashSet::new();
    for (source, target) in edges.clone() {
        if source == hovered {
            first_hop.insert(target);
        } else if target == hovered {
            first_hop.insert(source);
        }
    }

    // Expand from the first hop only, so nodes added here are never expanded.
    let mut second_hop = HashSet::new();
    for (source, target) in edges {
        if first_hop.contains(source) {
            second_hop.insert(target);
        }
        if first_hop.contains(target) {
            second_hop.insert(source);
        }
    }

    let mut highlighted = HashSet::with_capacity(1 + first_hop.len() + second_hop.len());
    highlighted.insert(hovered.to_owned());
    highlighted.extend(first_hop.into_iter().map(str::to_owned));
    highlighted.extend(second_hop.into_iter().map(str::to_owned));
    highlighted
}
