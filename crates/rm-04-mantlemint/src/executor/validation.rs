//! Block checks run by the standard executor before execution.

use shared_types::{Block, ChainState};

use crate::errors::MantlemintError;

/// Check that `block` extends `state`.
pub fn validate_block(state: &ChainState, block: &Block) -> Result<(), MantlemintError> {
    let header = &block.header;

    if header.chain_id != state.chain_id {
        return Err(MantlemintError::ChainIdMismatch {
            expected: state.chain_id.clone(),
            got: header.chain_id.clone(),
        });
    }

    let expected = state.last_block_height + 1;
    if header.height != expected {
        return Err(MantlemintError::WrongHeight {
            expected,
            got: header.height,
        });
    }

    if header.height > 1 && block.last_commit.height != state.last_block_height {
        return Err(MantlemintError::LastCommitHeight {
            height: header.height,
            got: block.last_commit.height,
        });
    }

    if header.app_hash != state.app_hash {
        return Err(MantlemintError::AppHashMismatch {
            height: header.height,
            expected: hex::encode(&state.app_hash),
            got: hex::encode(&header.app_hash),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ChainState {
        ChainState {
            chain_id: "rumor-test".into(),
            last_block_height: 3,
            app_hash: vec![1, 2],
            ..Default::default()
        }
    }

    fn block(height: u64) -> Block {
        let mut block = Block::default();
        block.header.chain_id = "rumor-test".into();
        block.header.height = height;
        block.header.app_hash = vec![1, 2];
        block.last_commit.height = height - 1;
        block
    }

    #[test]
    fn test_accepts_next_block() {
        assert!(validate_block(&state(), &block(4)).is_ok());
    }

    #[test]
    fn test_rejects_gap() {
        assert!(matches!(
            validate_block(&state(), &block(5)),
            Err(MantlemintError::WrongHeight { expected: 4, got: 5 })
        ));
    }

    #[test]
    fn test_rejects_other_chain() {
        let mut b = block(4);
        b.header.chain_id = "other".into();
        assert!(matches!(
            validate_block(&state(), &b),
            Err(MantlemintError::ChainIdMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_commit_for_wrong_height() {
        let mut b = block(4);
        b.last_commit.height = 2;
        assert!(matches!(
            validate_block(&state(), &b),
            Err(MantlemintError::LastCommitHeight { height: 4, got: 2 })
        ));
    }

    #[test]
    fn test_rejects_app_hash_mismatch() {
        let mut b = block(4);
        b.header.app_hash = vec![9];
        assert!(matches!(
            validate_block(&state(), &b),
            Err(MantlemintError::AppHashMismatch { height: 4, .. })
        ));
    }
}
