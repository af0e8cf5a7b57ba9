//! Transaction building, canonical encoding and signing.
//!
//! A transaction is signed in two rounds. Proposers and authorizers that are
//! not the payer sign the *payload*; the payer then signs the *envelope*,
//! which is the payload plus the payload signatures. Both messages are the
//! RLP encoding prefixed with the 32-byte transaction domain tag.
//!
//! The transaction id is the SHA3-256 hash of
//! `rlp([payload, [payload signatures], [envelope signatures]])`.

use rlp::RlpStream;

use crate::client::Signer;
use crate::error::{ConfigError, Error, ValidationError};

use super::rest::{ProposalKeyBody, SignatureBody, TransactionRequest};
use super::{AccountSnapshot, Address, Argument, Identifier, ScriptSignature, Signature};

const DOMAIN_TAG_TEXT: &[u8] = b"FLOW-V0.0-transaction";

/// `FLOW-V0.0-transaction`, right-padded with zero bytes to 32 bytes.
pub const DOMAIN_TAG: [u8; 32] = {
    let mut tag = [0u8; 32];
    let mut i = 0;
    while i < DOMAIN_TAG_TEXT.len() {
        tag[i] = DOMAIN_TAG_TEXT[i];
        i += 1;
    }
    tag
};

/// Gas limit used when the caller does not set one.
pub const DEFAULT_GAS_LIMIT: u64 = 9999;

/// The key whose sequence number a transaction consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProposalKey {
    pub address: Address,
    pub key_index: u32,
    pub sequence_number: u64,
}

/// Everything needed to build a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionSpec {
    pub script: String,
    pub arguments: Vec<Argument>,
    pub reference_block_id: Identifier,
    pub gas_limit: u64,
    pub proposal_key: ProposalKey,
    pub payer: Address,
    pub authorizers: Vec<Address>,
}

// ============================================================================
// UnsignedTransaction
// ============================================================================

/// A validated transaction, ready to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    script: Vec<u8>,
    arguments: Vec<Vec<u8>>,
    reference_block_id: Identifier,
    gas_limit: u64,
    proposal_key: ProposalKey,
    payer: Address,
    authorizers: Vec<Address>,
}

impl UnsignedTransaction {
    /// Validate the inputs and fix their argument encoding.
    ///
    /// Arguments are checked against the parameters the script declares, and
    /// the authorizer list against its `prepare` block.
    pub fn build(spec: TransactionSpec) -> Result<Self, ValidationError> {
        if spec.gas_limit == 0 {
            return Err(ValidationError::ZeroGasLimit);
        }
        let proposer = spec.proposal_key.address;
        if proposer != spec.payer && !spec.authorizers.contains(&proposer) {
            return Err(ValidationError::ProposerNotSigner(proposer));
        }

        ScriptSignature::parse(&spec.script)?.check(&spec.arguments, spec.authorizers.len())?;

        Ok(Self {
            script: spec.script.into_bytes(),
            arguments: spec.arguments.iter().map(Argument::to_bytes).collect(),
            reference_block_id: spec.reference_block_id,
            gas_limit: spec.gas_limit,
            proposal_key: spec.proposal_key,
            payer: spec.payer,
            authorizers: spec.authorizers,
        })
    }

    pub fn script(&self) -> &[u8] {
        &self.script
    }

    /// Encoded JSON-Cadence arguments, in order.
    pub fn arguments(&self) -> &[Vec<u8>] {
        &self.arguments
    }

    pub fn reference_block_id(&self) -> Identifier {
        self.reference_block_id
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn proposal_key(&self) -> ProposalKey {
        self.proposal_key
    }

    pub fn payer(&self) -> Address {
        self.payer
    }

    pub fn authorizers(&self) -> &[Address] {
        &self.authorizers
    }

    /// Every party, deduplicated: proposer, payer, then authorizers. A
    /// signature's signer index is the position of its address here.
    pub fn signers(&self) -> Vec<Address> {
        let mut out = Vec::with_capacity(2 + self.authorizers.len());
        for address in [self.proposal_key.address, self.payer]
            .into_iter()
            .chain(self.authorizers.iter().copied())
        {
            if !out.contains(&address) {
                out.push(address);
            }
        }
        out
    }

    /// Canonical RLP encoding of the payload.
    pub fn payload(&self) -> Vec<u8> {
        let mut s = RlpStream::new();
        self.append_payload(&mut s);
        s.out().to_vec()
    }

    /// The message payload signers sign: domain tag plus payload.
    pub fn payload_message(&self) -> Vec<u8> {
        tagged(&self.payload())
    }

    fn append_payload(&self, s: &mut RlpStream) {
        s.begin_list(9);
        s.append(&self.script);
        s.begin_list(self.arguments.len());
        for argument in &self.arguments {
            s.append(argument);
        }
        s.append(&self.reference_block_id.to_vec());
        s.append(&self.gas_limit);
        s.append(&self.proposal_key.address.as_bytes().to_vec());
        s.append(&u64::from(self.proposal_key.key_index));
        s.append(&self.proposal_key.sequence_number);
        s.append(&self.payer.as_bytes().to_vec());
        s.begin_list(self.authorizers.len());
        for authorizer in &self.authorizers {
            s.append(&authorizer.as_bytes().to_vec());
        }
    }

    fn envelope_message(&self, payload_signatures: &[TransactionSignature]) -> Vec<u8> {
        let mut s = RlpStream::new_list(2);
        self.append_payload(&mut s);
        append_signatures(&mut s, payload_signatures);
        tagged(&s.out())
    }

    /// Sign with every required party.
    ///
    /// Each signer signs for its own address: the payer's keys sign the
    /// envelope, every other party's keys sign the payload. The proposal key
    /// must be among the signers, and every party needs at least one key.
    pub fn sign(self, signers: &[&dyn Signer]) -> Result<SignedEnvelope, Error> {
        let parties = self.signers();

        let mut seen = Vec::with_capacity(signers.len());
        for signer in signers {
            let id = (signer.address(), signer.key_index());
            if seen.contains(&id) {
                return Err(ConfigError::DuplicateSigner {
                    address: id.0,
                    key_index: id.1,
                }
                .into());
            }
            if !parties.contains(&id.0) {
                return Err(ValidationError::UnknownSigner(id.0).into());
            }
            seen.push(id);
        }
        if let Some(missing) = parties
            .iter()
            .find(|party| !seen.iter().any(|(address, _)| address == *party))
        {
            return Err(ConfigError::MissingSigner(*missing).into());
        }
        let proposal = (self.proposal_key.address, self.proposal_key.key_index);
        if !seen.contains(&proposal) {
            return Err(ConfigError::ProposalKeyNotSigned {
                address: proposal.0,
                key_index: proposal.1,
            }
            .into());
        }

        let signer_index = |address: Address| {
            parties
                .iter()
                .position(|party| *party == address)
                .unwrap_or_default() as u32
        };

        let payload_message = self.payload_message();
        let mut payload_signatures = Vec::new();
        for signer in signers.iter().filter(|s| s.address() != self.payer) {
            payload_signatures.push(TransactionSignature {
                address: signer.address(),
                signer_index: signer_index(signer.address()),
                key_index: signer.key_index(),
                signature: signer.sign(&payload_message)?,
            });
        }
        payload_signatures.sort_by_key(TransactionSignature::order);

        let envelope_message = self.envelope_message(&payload_signatures);
        let mut envelope_signatures = Vec::new();
        for signer in signers.iter().filter(|s| s.address() == self.payer) {
            envelope_signatures.push(TransactionSignature {
                address: signer.address(),
                signer_index: signer_index(signer.address()),
                key_index: signer.key_index(),
                signature: signer.sign(&envelope_message)?,
            });
        }
        envelope_signatures.sort_by_key(TransactionSignature::order);

        tracing::trace!(
            payload_signatures = payload_signatures.len(),
            envelope_signatures = envelope_signatures.len(),
            "Signed transaction"
        );

        Ok(SignedEnvelope {
            transaction: self,
            payload_signatures,
            envelope_signatures,
        })
    }
}

fn tagged(bytes: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(DOMAIN_TAG.len() + bytes.len());
    message.extend_from_slice(&DOMAIN_TAG);
    message.extend_from_slice(bytes);
    message
}

fn append_signatures(s: &mut RlpStream, signatures: &[TransactionSignature]) {
    s.begin_list(signatures.len());
    for sig in signatures {
        s.begin_list(3);
        s.append(&u64::from(sig.signer_index));
        s.append(&u64::from(sig.key_index));
        s.append(&sig.signature.to_vec());
    }
}

// ============================================================================
// SignedEnvelope
// ============================================================================

/// One signature on a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionSignature {
    pub address: Address,
    /// Position of `address` in [`UnsignedTransaction::signers`].
    pub signer_index: u32,
    pub key_index: u32,
    pub signature: Signature,
}

impl TransactionSignature {
    fn order(&self) -> (u32, u32) {
        (self.signer_index, self.key_index)
    }
}

/// A fully signed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    transaction: UnsignedTransaction,
    payload_signatures: Vec<TransactionSignature>,
    envelope_signatures: Vec<TransactionSignature>,
}

impl SignedEnvelope {
    pub fn transaction(&self) -> &UnsignedTransaction {
        &self.transaction
    }

    pub fn payload_signatures(&self) -> &[TransactionSignature] {
        &self.payload_signatures
    }

    pub fn envelope_signatures(&self) -> &[TransactionSignature] {
        &self.envelope_signatures
    }

    /// Canonical encoding of the whole transaction.
    pub fn encode(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(3);
        self.transaction.append_payload(&mut s);
        append_signatures(&mut s, &self.payload_signatures);
        append_signatures(&mut s, &self.envelope_signatures);
        s.out().to_vec()
    }

    /// The id the node assigns on acceptance.
    pub fn transaction_id(&self) -> Identifier {
        Identifier::sha3_256(&self.encode())
    }

    /// The `POST /v1/transactions` body.
    pub fn to_request(&self) -> TransactionRequest {
        let tx = &self.transaction;
        let body = |sig: &TransactionSignature| SignatureBody {
            address: sig.address,
            key_index: sig.key_index,
            signature: sig.signature.to_vec(),
        };
        TransactionRequest {
            script: tx.script.clone(),
            arguments: tx.arguments.clone(),
            reference_block_id: tx.reference_block_id,
            gas_limit: tx.gas_limit,
            payer: tx.payer,
            proposal_key: ProposalKeyBody {
                address: tx.proposal_key.address,
                key_index: tx.proposal_key.key_index,
                sequence_number: tx.proposal_key.sequence_number,
            },
            authorizers: tx.authorizers.clone(),
            payload_signatures: self.payload_signatures.iter().map(body).collect(),
            envelope_signatures: self.envelope_signatures.iter().map(body).collect(),
        }
    }

    /// Rebuild an envelope from a submission body, keeping the argument bytes
    /// exactly as sent.
    pub fn from_request(request: &TransactionRequest) -> Result<Self, ValidationError> {
        let transaction = UnsignedTransaction {
            script: request.script.clone(),
            arguments: request.arguments.clone(),
            reference_block_id: request.reference_block_id,
            gas_limit: request.gas_limit,
            proposal_key: ProposalKey {
                address: request.proposal_key.address,
                key_index: request.proposal_key.key_index,
                sequence_number: request.proposal_key.sequence_number,
            },
            payer: request.payer,
            authorizers: request.authorizers.clone(),
        };
        let parties = transaction.signers();
        let signatures = |bodies: &[SignatureBody]| {
            let mut out = bodies
                .iter()
                .map(|body| {
                    let signer_index = parties
                        .iter()
                        .position(|party| *party == body.address)
                        .ok_or(ValidationError::UnknownSigner(body.address))?;
                    Ok(TransactionSignature {
                        address: body.address,
                        signer_index: signer_index as u32,
                        key_index: body.key_index,
                        signature: Signature::try_from(body.signature.as_slice())?,
                    })
                })
                .collect::<Result<Vec<_>, ValidationError>>()?;
            out.sort_by_key(TransactionSignature::order);
            Ok::<_, ValidationError>(out)
        };

        Ok(Self {
            payload_signatures: signatures(&request.payload_signatures)?,
            envelope_signatures: signatures(&request.envelope_signatures)?,
            transaction,
        })
    }

    /// Check every signature against the keys registered on the signing
    /// accounts.
    pub fn verify_signatures(&self, accounts: &[AccountSnapshot]) -> Result<(), Error> {
        let payload_message = self.transaction.payload_message();
        let envelope_message = self.transaction.envelope_message(&self.payload_signatures);

        let rounds = [
            (&self.payload_signatures, &payload_message),
            (&self.envelope_signatures, &envelope_message),
        ];
        for (signatures, message) in rounds {
            for sig in signatures.iter() {
                let account = accounts
                    .iter()
                    .find(|a| a.address == sig.address)
                    .ok_or_else(|| {
                        ConfigError::Invalid(format!("no account snapshot for {}", sig.address))
                    })?;
                let key = account.key(sig.key_index).ok_or(ConfigError::KeyNotFound {
                    address: sig.address,
                    key_index: sig.key_index,
                })?;
                if !sig.signature.verify(
                    &key.public_key,
                    key.signature_algorithm,
                    key.hash_algorithm,
                    message,
                ) {
                    return Err(Error::SignatureInvalid {
                        transaction_id: self.transaction_id(),
                        message: format!(
                            "signature by {} key #{} does not verify",
                            sig.address, sig.key_index
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}
