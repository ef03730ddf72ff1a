// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use crate::results::NUM_KEYPOINTS;

/// Skeleton drawn over a pose (pairs of keypoint indices).
pub const SKELETON: [[usize; 2]; 17] = [
    // Face
    [0, 1],
    [0, 2],
    [1, 3],
    [2, 4],
    // Arms
    [5, 6],
    [5, 7],
    [6, 8],
    [7, 9],
    [8, 10],
    // Torso
    [5, 9],
    [6, 10],
    [9, 11],
    [10, 12],
    // Legs
    [11, 13],
    [12, 14],
    [13, 15],
    [14, 16],
];

const _: () = {
    let mut i = 0;
    while i < SKELETON.len() {
        assert!(SKELETON[i][0] < NUM_KEYPOINTS && SKELETON[i][1] < NUM_KEYPOINTS);
        i += 1;
    }
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_keypoint_is_connected() {
        for k in 0..NUM_KEYPOINTS {
            assert!(
                SKELETON.iter().any(|e| e[0] == k || e[1] == k),
                "keypoint {k} has no edge"
            );
        }
    }
}
