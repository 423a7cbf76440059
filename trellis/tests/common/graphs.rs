use crate::common::virtual_network::VirtualNet;

/// The unit square: A - B, B - C, C - D, D - A, all cost 1. Every node has
/// two equal-cost paths to its diagonal opposite.
pub fn vnet_square() -> VirtualNet {
    VirtualNet::create(
        &["A", "B", "C", "D"],
        &[("A", "B"), ("B", "C"), ("C", "D"), ("D", "A")],
    )
}

/// A three-node line, no redundancy: a partition test bed.
pub fn vnet_line() -> VirtualNet {
    VirtualNet::create(&["A", "B", "C"], &[("A", "B"), ("B", "C")])
}
