//! Application lifecycle for one block, and the resulting state transition.

use shared_types::{
    AbciResponses, Block, ChainState, LastCommitInfo, Misbehavior, RequestBeginBlock,
    RequestDeliverTx, RequestEndBlock, VoteInfo,
};

use crate::collector::BlockEventPublisher;
use crate::errors::MantlemintError;
use crate::ports::app::Application;
use crate::state_store::StateStore;

/// Participation of the previous height's validators in `block.last_commit`.
///
/// Empty for the first block.
pub fn last_commit_info(store: &StateStore, block: &Block) -> Result<LastCommitInfo, MantlemintError> {
    let height = block.height();
    if height <= 1 {
        return Ok(LastCommitInfo::default());
    }

    let validators = store
        .load_validators(height - 1)?
        .ok_or(MantlemintError::MissingValidators { height: height - 1 })?;

    let commit = &block.last_commit;
    if commit.size() != validators.len() {
        return Err(MantlemintError::CommitSizeMismatch {
            height,
            expected: validators.len(),
            got: commit.size(),
        });
    }

    let votes = validators
        .validators
        .iter()
        .zip(&commit.signatures)
        .map(|(validator, sig)| VoteInfo {
            validator_address: validator.address,
            power: validator.voting_power,
            signed_last_block: !sig.absent,
        })
        .collect();

    Ok(LastCommitInfo {
        round: commit.round,
        votes,
    })
}

/// Evidence in `block`, resolved against the validator set of its height.
pub fn misbehaviors(store: &StateStore, block: &Block) -> Result<Vec<Misbehavior>, MantlemintError> {
    block
        .evidence
        .iter()
        .map(|evidence| {
            let validators = store
                .load_validators(evidence.height)?
                .ok_or(MantlemintError::MissingValidators {
                    height: evidence.height,
                })?;
            let (_, validator) = validators
                .get_by_address(&evidence.validator_address)
                .ok_or_else(|| MantlemintError::UnknownEvidenceValidator {
                    height: evidence.height,
                    address: hex::encode(evidence.validator_address),
                })?;

            Ok(Misbehavior {
                validator_address: validator.address,
                power: validator.voting_power,
                height: evidence.height,
                time: evidence.time,
                total_voting_power: evidence.total_voting_power,
            })
        })
        .collect()
}

/// Run BeginBlock, DeliverTx for every transaction in order, and EndBlock.
pub fn exec_block(
    app: &mut dyn Application,
    block: &Block,
    last_commit_info: LastCommitInfo,
    byzantine_validators: Vec<Misbehavior>,
    events: &mut dyn BlockEventPublisher,
) -> Result<AbciResponses, MantlemintError> {
    let begin_block = app.begin_block(RequestBeginBlock {
        hash: block.hash(),
        header: block.header.clone(),
        last_commit_info,
        byzantine_validators,
    })?;
    events.publish_begin_block(&begin_block);

    let mut deliver_txs = Vec::with_capacity(block.txs.len());
    for (index, tx) in block.txs.iter().enumerate() {
        let response = app.deliver_tx(RequestDeliverTx { tx: tx.clone() })?;
        events.publish_tx(index, &response);
        deliver_txs.push(response);
    }

    let end_block = app.end_block(RequestEndBlock {
        height: block.height(),
    })?;
    events.publish_end_block(&end_block);

    Ok(AbciResponses {
        begin_block,
        deliver_txs,
        end_block,
    })
}

/// Chain state after `block`, before the application commit fills the app hash.
///
/// Validator updates take effect two heights later, parameter updates one.
pub fn update_state(
    state: &ChainState,
    block: &Block,
    responses: &AbciResponses,
) -> Result<ChainState, MantlemintError> {
    let height = block.height();
    let end_block = &responses.end_block;

    let mut next_validators = state.next_validators.clone();
    let mut last_height_validators_changed = state.last_height_validators_changed;
    if !end_block.validator_updates.is_empty() {
        next_validators.apply_updates(&end_block.validator_updates)?;
        last_height_validators_changed = height + 2;
    }
    next_validators.increment_proposer_priority(1);

    let mut consensus_params = state.consensus_params.clone();
    let mut last_height_consensus_params_changed = state.last_height_consensus_params_changed;
    if let Some(updates) = end_block
        .consensus_param_updates
        .as_ref()
        .filter(|updates| !updates.is_empty())
    {
        consensus_params = consensus_params.update(updates);
        consensus_params.validate()?;
        last_height_consensus_params_changed = height + 1;
    }

    Ok(ChainState {
        chain_id: state.chain_id.clone(),
        last_block_height: height,
        last_block_id: block.block_id(),
        last_block_time: block.header.time,
        next_validators,
        validators: state.next_validators.clone(),
        last_validators: state.validators.clone(),
        last_height_validators_changed,
        consensus_params,
        last_height_consensus_params_changed,
        last_results_hash: responses.results_hash(),
        app_hash: Vec::new(),
    })
}
