use async_trait::async_trait;
use futures::StreamExt;
use subxt::{
    backend::{legacy::LegacyRpcMethods, rpc::RpcClient},
    config::polkadot::PolkadotExtrinsicParamsBuilder,
    dynamic,
    ext::scale_value::{Composite, Value, ValueDef},
    tx::{TxInBlock, TxStatus as SubxtTxStatus},
    utils::AccountId32,
    OnlineClient, PolkadotConfig,
};
use subxt_signer::sr25519::Keypair;
use tracing::{debug, info, warn};

use crate::{
    error::{ReleaseError, Result},
    ledger::{
        client::{BlockStream, LedgerClient, TxUpdateStream},
        keystore::{KeyType, Keystore},
        types::{
            AccountRef, AssetId, Candidate, LockdownState, NodeInfo, Reservation, ReservationEntry,
            TxUpdate,
        },
    },
};

type Api = OnlineClient<PolkadotConfig>;

/// Byte offsets of the key material inside a `Tokens::Reserves` storage key:
/// twox128(pallet) ++ twox128(entry) ++ blake2_128(owner) ++ owner ++ twox64(asset) ++ asset
const OWNER_OFFSET: usize = 48;
const ASSET_OFFSET: usize = OWNER_OFFSET + 32 + 8;

/// `LedgerClient` backed by a live Substrate node
pub struct SubstrateClient {
    api: Api,
    rpc: LegacyRpcMethods<PolkadotConfig>,
    signer: Keypair,
    endpoint: String,
}

impl SubstrateClient {
    /// Unlock the keystore and connect to `endpoint`
    pub async fn connect(endpoint: &str, keystore: &Keystore, password: &str) -> Result<Self> {
        let signer = unlock(keystore, password)?;

        let rpc_client = RpcClient::from_insecure_url(endpoint)
            .await
            .map_err(|e| ReleaseError::Setup(format!("Failed to connect to {}: {}", endpoint, e)))?;

        let api = Api::from_rpc_client(rpc_client.clone())
            .await
            .map_err(|e| ReleaseError::Setup(format!("Failed to initialise client for {}: {}", endpoint, e)))?;

        info!("Connected to {}", endpoint);

        Ok(Self {
            api,
            rpc: LegacyRpcMethods::new(rpc_client),
            signer,
            endpoint: endpoint.to_string(),
        })
    }
}

fn unlock(keystore: &Keystore, password: &str) -> Result<Keypair> {
    if keystore.key_type == KeyType::Ed25519 {
        return Err(ReleaseError::Keystore(
            "ed25519 keystores are not supported, export an sr25519 account".to_string(),
        ));
    }

    subxt_signer::polkadot_js_compat::decrypt_json(&keystore.json, password)
        .map_err(|e| ReleaseError::Keystore(format!("Failed to unlock keystore: {}", e)))
}

#[async_trait]
impl LedgerClient for SubstrateClient {
    async fn node_info(&self) -> Result<NodeInfo> {
        let (chain, node_name, node_version) = futures::try_join!(
            self.rpc.system_chain(),
            self.rpc.system_name(),
            self.rpc.system_version(),
        )?;

        Ok(NodeInfo {
            chain,
            node_name,
            node_version,
        })
    }

    fn signer_account(&self) -> AccountRef {
        AccountRef(self.signer.public_key().0)
    }

    async fn scan_reservations(&self) -> Result<Vec<ReservationEntry>> {
        let query = dynamic::storage("Tokens", "Reserves", Vec::<Value>::new());
        let mut pairs = self.api.storage().at_latest().await?.iter(query).await?;

        let mut entries = Vec::new();
        while let Some(pair) = pairs.next().await {
            let pair = pair?;
            let Some((owner, asset_id)) = decode_reserves_key(&pair.key_bytes) else {
                warn!("Skipping reserves entry with unexpected key length {}", pair.key_bytes.len());
                continue;
            };

            let value = pair
                .value
                .to_value()
                .map_err(|e| ReleaseError::Rpc(format!("Failed to decode reserves entry: {}", e)))?;
            let mut reservations = Vec::new();
            collect_reservations(&value, &mut reservations);

            entries.push(ReservationEntry {
                owner,
                asset_id,
                reservations,
            });
        }

        debug!("Read {} reserves entries", entries.len());
        Ok(entries)
    }

    async fn current_block_height(&self) -> Result<u64> {
        let block = self.api.blocks().at_latest().await?;
        Ok(block.number().into())
    }

    async fn lockdown_state(&self, asset_id: AssetId) -> Result<Option<LockdownState>> {
        let query = dynamic::storage(
            "CircuitBreaker",
            "AssetLockdownState",
            vec![Value::u128(asset_id.0 as u128)],
        );

        let Some(raw) = self.api.storage().at_latest().await?.fetch(&query).await? else {
            return Ok(None);
        };

        let value = raw.to_value().map_err(|e| {
            ReleaseError::Rpc(format!("Failed to decode lockdown state for asset {}: {}", asset_id, e))
        })?;
        lockdown_from_value(asset_id, &value).map(Some)
    }

    async fn next_sequence_number(&self, account: &AccountRef) -> Result<u64> {
        Ok(self.api.tx().account_nonce(&AccountId32(account.0)).await?)
    }

    async fn submit_release(&self, candidate: &Candidate, nonce: u64) -> Result<TxUpdateStream> {
        let call = dynamic::tx(
            "CircuitBreaker",
            "release_deposit",
            vec![
                Value::from_bytes(candidate.owner.0),
                Value::u128(candidate.asset_id.0 as u128),
            ],
        );
        let params = PolkadotExtrinsicParamsBuilder::<PolkadotConfig>::new()
            .nonce(nonce)
            .build();

        let progress = self
            .api
            .tx()
            .create_signed(&call, &self.signer, params)
            .await?
            .submit_and_watch()
            .await?;

        Ok(progress.then(map_status).boxed())
    }

    async fn subscribe_new_blocks(&self) -> Result<BlockStream> {
        let blocks = self.api.blocks().subscribe_best().await?;

        Ok(blocks
            .filter_map(|block| async move {
                match block {
                    Ok(block) => {
                        let height: u64 = block.number().into();
                        Some(height)
                    }
                    Err(e) => {
                        warn!("Block subscription error: {}", e);
                        None
                    }
                }
            })
            .boxed())
    }

    async fn disconnect(&self) {
        // The websocket closes when the client is dropped
        info!("Disconnecting from {}", self.endpoint);
    }
}

async fn map_status(status: std::result::Result<SubxtTxStatus<PolkadotConfig, Api>, subxt::Error>) -> Result<TxUpdate> {
    match status? {
        SubxtTxStatus::Validated | SubxtTxStatus::Broadcasted { .. } | SubxtTxStatus::NoLongerInBestBlock => {
            Ok(TxUpdate::submitted())
        }
        SubxtTxStatus::InBestBlock(tx) => {
            let hash = format!("{:?}", tx.block_hash());
            with_dispatch_result(TxUpdate::in_block(hash), tx).await
        }
        SubxtTxStatus::InFinalizedBlock(tx) => {
            let hash = format!("{:?}", tx.block_hash());
            with_dispatch_result(TxUpdate::finalized(hash), tx).await
        }
        SubxtTxStatus::Error { message }
        | SubxtTxStatus::Invalid { message }
        | SubxtTxStatus::Dropped { message } => Err(ReleaseError::Rpc(message)),
    }
}

async fn with_dispatch_result(update: TxUpdate, tx: TxInBlock<PolkadotConfig, Api>) -> Result<TxUpdate> {
    match tx.wait_for_success().await {
        Ok(_) => Ok(update),
        Err(subxt::Error::Runtime(dispatch_error)) => Ok(update.with_dispatch_error(dispatch_error.to_string())),
        Err(e) => Err(e.into()),
    }
}

fn lockdown_from_value<T: std::fmt::Debug>(asset_id: AssetId, value: &Value<T>) -> Result<LockdownState> {
    match &value.value {
        ValueDef::Variant(variant) if variant.name == "Locked" => {
            let until = variant
                .values
                .values()
                .next()
                .and_then(|v| v.as_u128())
                .ok_or_else(|| ReleaseError::Rpc(format!("Malformed lockdown state for asset {}", asset_id)))?;
            Ok(LockdownState::LockedUntil(until as u64))
        }
        ValueDef::Variant(_) => Ok(LockdownState::Unlocked),
        other => Err(ReleaseError::Rpc(format!(
            "Unexpected lockdown state shape for asset {}: {:?}",
            asset_id, other
        ))),
    }
}

fn decode_reserves_key(key: &[u8]) -> Option<(AccountRef, AssetId)> {
    let owner: [u8; 32] = key.get(OWNER_OFFSET..OWNER_OFFSET + 32)?.try_into().ok()?;
    let asset: [u8; 4] = key.get(ASSET_OFFSET..ASSET_OFFSET + 4)?.try_into().ok()?;
    Some((AccountRef(owner), AssetId(u32::from_le_bytes(asset))))
}

/// Walk a decoded reserves value and pull out every `{ id, value }` record,
/// whatever wrappers the runtime puts around the list.
fn collect_reservations<T>(value: &Value<T>, out: &mut Vec<Reservation>) {
    match &value.value {
        ValueDef::Composite(Composite::Named(fields)) => {
            let id = fields.iter().find(|(name, _)| name == "id").map(|(_, v)| v);
            if let Some(id) = id {
                let amount = fields
                    .iter()
                    .find(|(name, _)| name == "value" || name == "amount")
                    .and_then(|(_, v)| v.as_u128())
                    .unwrap_or_default();
                out.push(Reservation {
                    kind: reserve_kind(id),
                    amount,
                });
            } else {
                for (_, field) in fields {
                    collect_reservations(field, out);
                }
            }
        }
        ValueDef::Composite(Composite::Unnamed(values)) => {
            for item in values {
                collect_reservations(item, out);
            }
        }
        _ => {}
    }
}

fn reserve_kind<T>(id: &Value<T>) -> String {
    let bytes: Vec<u8> = match &id.value {
        ValueDef::Composite(composite) => composite
            .values()
            .filter_map(|b| b.as_u128())
            .map(|b| b as u8)
            .collect(),
        _ => Vec::new(),
    };

    let trimmed = bytes
        .iter()
        .rposition(|b| *b != 0)
        .map(|last| &bytes[..=last])
        .unwrap_or(&[]);
    String::from_utf8_lossy(trimmed).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_reserves_key() {
        let mut key = vec![0u8; 48];
        key.extend_from_slice(&[7u8; 32]);
        key.extend_from_slice(&[0u8; 8]);
        key.extend_from_slice(&42u32.to_le_bytes());

        let (owner, asset) = decode_reserves_key(&key).unwrap();
        assert_eq!(owner, AccountRef([7; 32]));
        assert_eq!(asset, AssetId(42));

        assert!(decode_reserves_key(&key[..60]).is_none());
    }

    #[test]
    fn test_lockdown_from_value() {
        let locked = Value::unnamed_variant("Locked", [Value::u128(1_500)]);
        assert_eq!(
            lockdown_from_value(AssetId(3), &locked).unwrap(),
            LockdownState::LockedUntil(1_500)
        );

        let unlocked = Value::unnamed_variant("Unlocked", []);
        assert_eq!(lockdown_from_value(AssetId(3), &unlocked).unwrap(), LockdownState::Unlocked);

        assert!(lockdown_from_value(AssetId(3), &Value::unnamed_variant("Locked", [])).is_err());
        assert!(lockdown_from_value(AssetId(3), &Value::u128(1)).is_err());
    }

    #[test]
    fn test_unlock_rejects_ed25519_keystore() {
        let keystore = Keystore {
            json: r#"{"encoding":{"content":["pkcs8","ed25519"]}}"#.to_string(),
            key_type: KeyType::Ed25519,
        };

        let Err(err) = unlock(&keystore, "123456") else {
            panic!("ed25519 keystore unlocked");
        };
        assert!(matches!(err, ReleaseError::Keystore(_)));
    }

    #[test]
    fn test_unlock_reports_undecryptable_keystore() {
        let keystore = Keystore::parse(r#"{"encoding":{"content":["pkcs8","sr25519"]}}"#.to_string()).unwrap();

        let Err(err) = unlock(&keystore, "123456") else {
            panic!("keystore without key material unlocked");
        };
        assert!(err.to_string().contains("Failed to unlock keystore"));
    }

    #[test]
    fn test_collect_reservations() {
        let record = |kind: &[u8], amount: u128| {
            let mut id = [0u8; 8];
            id[..kind.len()].copy_from_slice(kind);
            Value::named_composite([
                ("id", Value::from_bytes(id)),
                ("value", Value::u128(amount)),
            ])
        };
        let value = Value::unnamed_composite([Value::unnamed_composite([
            record(b"depositc", 500),
            record(b"otc", 7),
        ])]);

        let mut out = Vec::new();
        collect_reservations(&value, &mut out);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].kind, "depositc");
        assert_eq!(out[0].amount, 500);
        assert_eq!(out[1].kind, "otc");
    }
}
