//! Confirms state survives a process restart: a second `App` opened over the
//! same underlying store, after the first has gone out of scope, must see
//! exactly what the first committed.

use chain_chainstore::{ChainStorage, MetaStorage};
use chain_crypto::{Address, KeyPair, MethodId, EMPTY_HASH};
use chain_kv::MemoryKv;
use chain_node::{App, NodeConfig};
use chain_types::{TxPayload, TxSender, Transaction};
use std::rc::Rc;

fn sign(keypair: &KeyPair, receiver: Address, nonce: u64, payload: TxPayload) -> Transaction {
    let mut tx = Transaction {
        version: 1,
        sender: TxSender {
            public_key: keypair.public_key(),
            nonce,
        },
        receiver,
        payload,
        gas_price: 1,
        gas_limit: 1_000_000,
        signature: Vec::new(),
    };
    tx.signature = keypair.sign(&tx.sig_hash()).0.to_vec();
    tx
}

fn empty_payload() -> TxPayload {
    TxPayload {
        id: MethodId::default(),
        args: Vec::new(),
        contract: Vec::new(),
    }
}

#[test]
fn account_and_block_survive_a_restart() {
    let kv = Rc::new(MemoryKv::new());
    let sender = KeyPair::generate();
    let receiver = Address::from_public_key(&KeyPair::generate().public_key());

    let block_hash = {
        let mut app = App::new(Rc::clone(&kv), NodeConfig::default());
        app.begin(1, EMPTY_HASH, 1_000).unwrap();
        let tx = sign(&sender, receiver, 0, empty_payload());
        app.deliver(&tx.encode()).unwrap();
        app.commit().unwrap()
    };

    // Drop the first `App` entirely and open a second one over the same
    // store, the way a node process restarting would reopen its database.
    let app = App::new(Rc::clone(&kv), NodeConfig::default());
    let (height, hash) = app.info().unwrap();
    assert_eq!(height, 1);
    assert_eq!(hash, block_hash);

    // The committed sender account (nonce bumped by the delivered transfer)
    // must be reachable through a state view opened straight from the
    // persisted block, without replaying anything.
    let chain = ChainStorage::new(Rc::clone(&kv));
    let block = chain.get_block(block_hash).unwrap();
    assert_eq!(block.height, 1);
    let state = chain_state::StateStorage::load_state(Rc::clone(&kv), Some(block.state_root));
    let sender_address = Address::from_public_key(&sender.public_key());
    let account = state.get_account(sender_address).unwrap().unwrap();
    assert_eq!(account.nonce, 1);
}

#[test]
fn meta_store_tracks_latest_height_across_reopen() {
    let kv = Rc::new(MemoryKv::new());
    {
        let mut app = App::new(Rc::clone(&kv), NodeConfig::default());
        app.begin(1, EMPTY_HASH, 1_000).unwrap();
        app.commit().unwrap();
    }
    let meta = MetaStorage::new(Rc::clone(&kv));
    assert_eq!(meta.latest_block_height().unwrap(), 1);
    assert!(meta.block_height_to_block_hash(1).unwrap().is_some());

    // A fresh `App` restarting against the same store picks up right where
    // the last one left off rather than reproposing height 1.
    let mut app = App::new(Rc::clone(&kv), NodeConfig::default());
    let (height, hash) = app.info().unwrap();
    app.begin(height + 1, hash, 2_000).unwrap();
    let tx = sign(
        &KeyPair::generate(),
        Address::from_public_key(&KeyPair::generate().public_key()),
        0,
        empty_payload(),
    );
    app.deliver(&tx.encode()).unwrap();
    let next_hash = app.commit().unwrap();
    assert_ne!(next_hash, hash);
    assert_eq!(app.info().unwrap().0, 2);
}
