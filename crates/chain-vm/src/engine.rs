use crate::errors::VmError;
use crate::gas_meter::GasMeter;
use crate::wasi;
use chain_abi::{Contract, Header, Parameter};
use chain_crypto::{blake2b_256, Address, Signature};
use chain_gas::GasPolicy;
use chain_kv::KeyValueStore;
use chain_state::StateStorage;
use chain_types::Event;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::warn;
use wasmi::{Caller, Config, Engine as WasmiEngine, Extern, Linker, Memory, Module, Store, Val};

use crate::MAX_ARGUMENT_BYTES;

const DATA_END_GLOBAL: &str = "__data_end";

pub(crate) struct ForeignMethod {
    pub(crate) contract_address: Address,
    pub(crate) name: String,
}

/// Host-visible state for one contract invocation. Lives inside the
/// `wasmi::Store` and is reachable from every host import via `Caller`.
/// `gas` and `events` are shared (via `Rc`) with the root engine and every
/// sibling/child invocation in the same transaction; everything else is
/// private to this one call.
pub(crate) struct HostCtx<S: KeyValueStore + ?Sized + 'static> {
    pub(crate) state: Rc<RefCell<StateStorage<S>>>,
    pub(crate) address: Address,
    pub(crate) caller: Address,
    pub(crate) creator: Address,
    pub(crate) header: Rc<Header>,
    pub(crate) policy: Rc<dyn GasPolicy>,
    pub(crate) gas: GasMeter,
    pub(crate) events: Rc<RefCell<Vec<Event>>>,
    pub(crate) method_lookup: RefCell<HashMap<String, ForeignMethod>>,
    pub(crate) ptr_sizes: RefCell<HashMap<i32, i32>>,
    pub(crate) call_depth: usize,
    pub(crate) mem_aggr: usize,
    pub(crate) max_call_depth: usize,
    pub(crate) block_height: u64,
    pub(crate) block_time: u64,
    pub(crate) fuel_checkpoint: Cell<u64>,
    pub(crate) memory: RefCell<Option<Memory>>,
}

/// Executes one contract invocation: resolves the account's code, decodes
/// and marshals arguments, runs the module under a shared gas budget, and
/// collects events bubbled up from any nested cross-contract calls.
///
/// A child spawned to service a cross-contract call shares `state`,
/// `policy`, `events` and the gas counter with its parent, but sees the
/// callee's own account as `address` and the caller's address as `caller`
/// -- matching the original's `newChildEngine`.
pub struct Engine<S: KeyValueStore + ?Sized + 'static> {
    state: Rc<RefCell<StateStorage<S>>>,
    address: Address,
    caller: Address,
    policy: Rc<dyn GasPolicy>,
    gas: GasMeter,
    events: Rc<RefCell<Vec<Event>>>,
    call_depth: usize,
    mem_aggr: usize,
    max_call_depth: usize,
    block_height: u64,
    block_time: u64,
}

impl<S: KeyValueStore + ?Sized + 'static> Engine<S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: Rc<RefCell<StateStorage<S>>>,
        address: Address,
        caller: Address,
        policy: Rc<dyn GasPolicy>,
        gas_limit: u64,
        max_call_depth: usize,
        block_height: u64,
        block_time: u64,
    ) -> Self {
        Engine {
            state,
            address,
            caller,
            policy,
            gas: GasMeter::new(gas_limit),
            events: Rc::new(RefCell::new(Vec::new())),
            call_depth: 0,
            mem_aggr: 0,
            max_call_depth,
            block_height,
            block_time,
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn gas_used(&self) -> u64 {
        self.gas.used()
    }

    fn new_child(&self, address: Address, extra_mem: usize) -> Self {
        Engine {
            state: Rc::clone(&self.state),
            address,
            caller: self.address,
            policy: Rc::clone(&self.policy),
            gas: self.gas.clone(),
            events: Rc::clone(&self.events),
            call_depth: self.call_depth + 1,
            mem_aggr: self.mem_aggr + extra_mem,
            max_call_depth: self.max_call_depth,
            block_height: self.block_height,
            block_time: self.block_time,
        }
    }

    /// Runs `method` against this engine's account, returning the u64
    /// result the contract's exported function produced.
    pub fn ignite(&self, method: &str, method_args: &[u8]) -> Result<u64, VmError> {
        let (contract, creator) = {
            let mut state = self.state.borrow_mut();
            let account = state
                .load_account(self.address)?
                .ok_or_else(|| VmError::Ignite(format!("account {} not found", self.address)))?;
            let bytes = account
                .contract_bytes()
                .ok_or_else(|| VmError::Ignite("account has no deployed contract".to_string()))?;
            (Contract::decode(bytes)?, account.creator)
        };

        let function = contract
            .header
            .get_function(method)
            .cloned()
            .ok_or_else(|| VmError::MethodNotFound(method.to_string()))?;

        let decoded = chain_abi::decode_to_bytes(&function.parameters, method_args)?;
        let byte_size: usize = decoded.iter().map(Vec::len).sum();
        if byte_size > MAX_ARGUMENT_BYTES {
            return Err(VmError::ArgumentsTooLarge);
        }

        let mut config = Config::default();
        config.consume_fuel(true);
        let wasmi_engine = WasmiEngine::new(&config);
        let module = Module::new(&wasmi_engine, &contract.code[..])
            .map_err(|e| VmError::Module(e.to_string()))?;

        let ctx = HostCtx {
            state: Rc::clone(&self.state),
            address: self.address,
            caller: self.caller,
            creator,
            header: Rc::new(contract.header.clone()),
            policy: Rc::clone(&self.policy),
            gas: self.gas.clone(),
            events: Rc::clone(&self.events),
            method_lookup: RefCell::new(HashMap::new()),
            ptr_sizes: RefCell::new(HashMap::new()),
            call_depth: self.call_depth,
            mem_aggr: self.mem_aggr,
            max_call_depth: self.max_call_depth,
            block_height: self.block_height,
            block_time: self.block_time,
            fuel_checkpoint: Cell::new(self.gas.remaining()),
            memory: RefCell::new(None),
        };

        let mut store = Store::new(&wasmi_engine, ctx);
        store
            .set_fuel(self.gas.remaining())
            .map_err(|e| VmError::Module(e.to_string()))?;

        let mut linker = Linker::new(&wasmi_engine);
        register_env_imports(&mut linker, &module).map_err(|e| VmError::Module(e.to_string()))?;
        register_dynamic_imports(&mut linker, &module, &contract.header)
            .map_err(|e| VmError::Module(e.to_string()))?;

        let instance = linker
            .instantiate(&mut store, &module)
            .and_then(|pre| pre.start(&mut store))
            .map_err(|e| VmError::Trap(e.to_string()))?;

        let memory = instance
            .get_export(&store, "memory")
            .and_then(Extern::into_memory)
            .ok_or_else(|| VmError::Module("module exports no linear memory".to_string()))?;
        *store.data().memory.borrow_mut() = Some(memory);

        let offset = data_end_offset(&instance, &mut store)?;
        let (wasm_args, ptr_writes) = marshal_arguments(&decoded, &function.parameters, offset)?;
        for (ptr, bytes) in &ptr_writes {
            memory
                .write(&mut store, *ptr as usize, bytes)
                .map_err(|e| VmError::Trap(e.to_string()))?;
        }
        {
            let ctx = store.data();
            let mut sizes = ctx.ptr_sizes.borrow_mut();
            for (ptr, bytes) in &ptr_writes {
                sizes.insert(*ptr, bytes.len() as i32);
            }
        }

        let func = instance
            .get_func(&store, method)
            .ok_or_else(|| VmError::MethodNotFound(method.to_string()))?;
        let params: Vec<Val> = wasm_args
            .iter()
            .zip(function.parameters.iter())
            .map(|(raw, param)| raw_to_val(*raw, param))
            .collect();
        let mut results = [Val::I64(0)];

        let call_result = func.call(&mut store, &params, &mut results);

        let final_fuel = store.get_fuel().unwrap_or(0);
        let checkpoint = store.data().fuel_checkpoint.get();
        let consumed = checkpoint.saturating_sub(final_fuel);
        if consumed > 0 {
            self.gas.burn(consumed)?;
        }

        match call_result {
            Ok(()) => Ok(value_to_u64(results[0])),
            Err(err) => {
                warn!(contract = %self.address, method, error = %err, "contract trapped");
                Err(VmError::Trap(err.to_string()))
            }
        }
    }
}

fn data_end_offset<S: KeyValueStore + ?Sized + 'static>(
    instance: &wasmi::Instance,
    store: &mut Store<HostCtx<S>>,
) -> Result<i32, VmError> {
    let global = instance
        .get_global(&*store, DATA_END_GLOBAL)
        .ok_or_else(|| VmError::Module("module has no __data_end global".to_string()))?;
    match global.get(&*store) {
        Val::I32(v) => Ok(v),
        other => Err(VmError::Module(format!(
            "__data_end global has unexpected type {other:?}"
        ))),
    }
}

fn raw_to_val(raw: u64, param: &Parameter) -> Val {
    if param.is_array || param.ty.is_address() {
        Val::I32(raw as i32)
    } else if param.ty.memory_size() == 8 {
        Val::I64(raw as i64)
    } else {
        Val::I32(raw as i32)
    }
}

fn value_to_u64(value: Val) -> u64 {
    match value {
        Val::I64(v) => v as u64,
        Val::I32(v) => v as u32 as u64,
        _ => 0,
    }
}

/// Builds each argument per the marshalling rules: pointer-like values
/// (arrays and addresses) are written into linear memory at an
/// incrementing scratch offset and passed as that offset; scalars are
/// zero-padded to the full 8 bytes and passed as the raw register value,
/// which the callee's own WASM type narrows on use.
fn marshal_arguments(
    byte_args: &[Vec<u8>],
    params: &[Parameter],
    mut offset: i32,
) -> Result<(Vec<u64>, Vec<(i32, Vec<u8>)>), VmError> {
    let mut args = vec![0u64; byte_args.len()];
    let mut writes = Vec::new();
    for (i, bytes) in byte_args.iter().enumerate() {
        let is_pointer = params[i].is_array || params[i].ty.is_address();
        if is_pointer {
            if params[i].ty.is_address() {
                Address::from_bytes(bytes)?;
            }
            args[i] = offset as u64;
            offset += bytes.len() as i32;
            writes.push((args[i] as i32, bytes.clone()));
        } else {
            let mut buf = [0u8; 8];
            let n = bytes.len().min(8);
            buf[..n].copy_from_slice(&bytes[..n]);
            args[i] = u64::from_le_bytes(buf);
        }
    }
    Ok((args, writes))
}

fn memory_of<S: KeyValueStore + ?Sized + 'static>(
    caller: &Caller<'_, HostCtx<S>>,
) -> Result<Memory, VmError> {
    caller
        .data()
        .memory
        .borrow()
        .ok_or_else(|| VmError::Module("memory not yet bound".to_string()))
}

fn read_at<S: KeyValueStore + ?Sized + 'static>(
    caller: &Caller<'_, HostCtx<S>>,
    ptr: i32,
    size: i32,
) -> Result<Vec<u8>, VmError> {
    let memory = memory_of(caller)?;
    let mut buf = vec![0u8; size.max(0) as usize];
    memory
        .read(caller, ptr as usize, &mut buf)
        .map_err(|e| VmError::Trap(e.to_string()))?;
    Ok(buf)
}

fn write_at<S: KeyValueStore + ?Sized + 'static>(
    caller: &mut Caller<'_, HostCtx<S>>,
    ptr: i32,
    data: &[u8],
) -> Result<(), VmError> {
    let memory = memory_of(caller)?;
    memory
        .write(&mut *caller, ptr as usize, data)
        .map_err(|e| VmError::Trap(e.to_string()))?;
    Ok(())
}

/// Folds whatever `wasmi`'s own instruction-level fuel accounting has
/// burned since the last checkpoint into the shared gas meter, then resets
/// both the meter's idea of "remaining" and the store's fuel to match.
/// Called before any explicit host charge and before handing control to a
/// nested call, so a child engine's budget (and any trap raised by either
/// pool) always reflects the true total consumed so far.
fn reconcile_fuel<S: KeyValueStore + ?Sized + 'static>(
    caller: &mut Caller<'_, HostCtx<S>>,
) -> Result<(), VmError> {
    let checkpoint = caller.data().fuel_checkpoint.get();
    let current = caller.get_fuel().map_err(|e| VmError::Trap(e.to_string()))?;
    let consumed = checkpoint.saturating_sub(current);
    if consumed > 0 {
        caller.data().gas.burn(consumed)?;
    }
    resync_fuel(caller)
}

fn resync_fuel<S: KeyValueStore + ?Sized + 'static>(
    caller: &mut Caller<'_, HostCtx<S>>,
) -> Result<(), VmError> {
    let remaining = caller.data().gas.remaining();
    caller.data().fuel_checkpoint.set(remaining);
    caller
        .set_fuel(remaining)
        .map_err(|e| VmError::Trap(e.to_string()))
}

fn charge<S: KeyValueStore + ?Sized + 'static>(
    caller: &mut Caller<'_, HostCtx<S>>,
    cost: u64,
) -> Result<(), VmError> {
    reconcile_fuel(caller)?;
    caller.data().gas.burn(cost)?;
    resync_fuel(caller)
}

fn register_env_imports<S: KeyValueStore + ?Sized + 'static>(
    linker: &mut Linker<HostCtx<S>>,
    _module: &Module,
) -> Result<(), wasmi::Error> {
    linker.func_wrap(
        "env",
        "chain_storage_set",
        |mut caller: Caller<'_, HostCtx<S>>, key_ptr: i32, key_len: i32, value_ptr: i32, value_len: i32| -> Result<u64, wasmi::Error> {
            let cost = caller.data().policy.cost_for_storage(value_len.max(0) as usize);
            charge(&mut caller, cost)?;
            let key = read_at(&caller, key_ptr, key_len)?;
            let value = read_at(&caller, value_ptr, value_len)?;
            let len = value.len() as u64;
            let ctx = caller.data();
            let mut state = ctx.state.borrow_mut();
            let account = state
                .load_account(ctx.address)
                .map_err(VmError::from)?
                .ok_or_else(|| VmError::Ignite("account not found".to_string()))?;
            account.set_storage(&key, value).map_err(VmError::from)?;
            Ok(len)
        },
    )?;

    linker.func_wrap(
        "env",
        "chain_storage_get",
        |mut caller: Caller<'_, HostCtx<S>>, key_ptr: i32, key_len: i32, value_ptr: i32| -> Result<u64, wasmi::Error> {
            let key = read_at(&caller, key_ptr, key_len)?;
            let value = {
                let ctx = caller.data();
                let mut state = ctx.state.borrow_mut();
                let account = state
                    .load_account(ctx.address)
                    .map_err(VmError::from)?
                    .ok_or_else(|| VmError::Ignite("account not found".to_string()))?;
                account.get_storage(&key).map_err(VmError::from)?
            };
            match value {
                Some(v) => {
                    let len = v.len() as u64;
                    write_at(&mut caller, value_ptr, &v)?;
                    Ok(len)
                }
                None => Ok(0),
            }
        },
    )?;

    linker.func_wrap(
        "env",
        "chain_storage_size_get",
        |caller: Caller<'_, HostCtx<S>>, key_ptr: i32, key_len: i32| -> Result<u64, wasmi::Error> {
            let key = read_at(&caller, key_ptr, key_len)?;
            let ctx = caller.data();
            let mut state = ctx.state.borrow_mut();
            let account = state
                .load_account(ctx.address)
                .map_err(VmError::from)?
                .ok_or_else(|| VmError::Ignite("account not found".to_string()))?;
            let value = account.get_storage(&key).map_err(VmError::from)?;
            Ok(value.map(|v| v.len()).unwrap_or(0) as u64)
        },
    )?;

    linker.func_wrap(
        "env",
        "chain_get_caller",
        |mut caller: Caller<'_, HostCtx<S>>, out_ptr: i32| -> Result<u64, wasmi::Error> {
            let addr = caller.data().caller;
            write_at(&mut caller, out_ptr, addr.as_bytes())?;
            Ok(0)
        },
    )?;

    linker.func_wrap(
        "env",
        "chain_get_creator",
        |mut caller: Caller<'_, HostCtx<S>>, out_ptr: i32| -> Result<u64, wasmi::Error> {
            let addr = caller.data().creator;
            write_at(&mut caller, out_ptr, addr.as_bytes())?;
            Ok(0)
        },
    )?;

    linker.func_wrap(
        "env",
        "chain_get_contract_address",
        |mut caller: Caller<'_, HostCtx<S>>, out_ptr: i32| -> Result<u64, wasmi::Error> {
            let addr = caller.data().address;
            write_at(&mut caller, out_ptr, addr.as_bytes())?;
            Ok(out_ptr as u64)
        },
    )?;

    linker.func_wrap(
        "env",
        "chain_arg_size_get",
        |caller: Caller<'_, HostCtx<S>>, ptr: i32| -> Result<u64, wasmi::Error> {
            let size = caller
                .data()
                .ptr_sizes
                .borrow()
                .get(&ptr)
                .copied()
                .ok_or(VmError::PointerSizeNotFound(ptr))?;
            Ok(size as u64)
        },
    )?;

    linker.func_wrap(
        "env",
        "chain_arg_size_set",
        |caller: Caller<'_, HostCtx<S>>, ptr: i32, size: i32| -> Result<u64, wasmi::Error> {
            caller.data().ptr_sizes.borrow_mut().insert(ptr, size);
            Ok(0)
        },
    )?;

    linker.func_wrap(
        "env",
        "chain_block_height",
        |caller: Caller<'_, HostCtx<S>>| -> Result<u64, wasmi::Error> { Ok(caller.data().block_height) },
    )?;

    linker.func_wrap(
        "env",
        "chain_block_time",
        |caller: Caller<'_, HostCtx<S>>| -> Result<u64, wasmi::Error> { Ok(caller.data().block_time) },
    )?;

    linker.func_wrap(
        "env",
        "chain_args_write",
        |mut caller: Caller<'_, HostCtx<S>>, buffer_ptr: i32, value_ptr: i32, value_size: i32| -> Result<u64, wasmi::Error> {
            let buffer_size = caller
                .data()
                .ptr_sizes
                .borrow()
                .get(&buffer_ptr)
                .copied()
                .unwrap_or(0);
            let mut slot = [0u8; 4];
            slot.copy_from_slice(&(value_ptr as u32).to_le_bytes());
            write_at(&mut caller, buffer_ptr + buffer_size, &slot)?;
            let mut sizes = caller.data().ptr_sizes.borrow_mut();
            sizes.insert(value_ptr, value_size);
            sizes.insert(buffer_ptr, buffer_size + 4);
            Ok(buffer_ptr as u64)
        },
    )?;

    linker.func_wrap(
        "env",
        "chain_args_hash",
        |mut caller: Caller<'_, HostCtx<S>>, buffer_ptr: i32, hash_ptr: i32| -> Result<u64, wasmi::Error> {
            let buffer_size = caller
                .data()
                .ptr_sizes
                .borrow()
                .get(&buffer_ptr)
                .copied()
                .ok_or(VmError::PointerSizeNotFound(buffer_ptr))?;
            let arg_count = buffer_size / 4;
            let mut values = Vec::with_capacity(arg_count as usize);
            for i in 0..arg_count {
                let ptr_mem = read_at(&caller, buffer_ptr + i * 4, 4)?;
                let ptr = i32::from_le_bytes(ptr_mem.try_into().unwrap());
                let size = caller
                    .data()
                    .ptr_sizes
                    .borrow()
                    .get(&ptr)
                    .copied()
                    .ok_or(VmError::PointerSizeNotFound(ptr))?;
                values.push(read_at(&caller, ptr, size)?);
            }
            let encoded = rlp::encode_list::<Vec<u8>, _>(&values).to_vec();
            let hash = blake2b_256(&encoded);
            write_at(&mut caller, hash_ptr, &hash)?;
            Ok(0)
        },
    )?;

    linker.func_wrap(
        "env",
        "chain_ed25519_verify",
        |caller: Caller<'_, HostCtx<S>>, addr_ptr: i32, hash_ptr: i32, sig_ptr: i32| -> Result<u64, wasmi::Error> {
            let addr_bytes = read_at(&caller, addr_ptr, chain_crypto::ADDRESS_LENGTH as i32)?;
            let address = Address::from_bytes(&addr_bytes).map_err(VmError::from)?;
            let hash = read_at(&caller, hash_ptr, 32)?;
            let sig_bytes = read_at(&caller, sig_ptr, 64)?;
            let mut sig = [0u8; 64];
            sig.copy_from_slice(&sig_bytes);
            let ok = address
                .public_key()
                .verify(&hash, &Signature(sig))
                .is_ok();
            Ok(if ok { 1 } else { 0 })
        },
    )?;

    linker.func_wrap(
        "env",
        "chain_method_bind",
        |caller: Caller<'_, HostCtx<S>>, addr_ptr: i32, method_ptr: i32, method_len: i32, alias_ptr: i32, alias_len: i32| -> Result<u64, wasmi::Error> {
            let addr_bytes = read_at(&caller, addr_ptr, chain_crypto::ADDRESS_LENGTH as i32)?;
            let contract_address = Address::from_bytes(&addr_bytes).map_err(VmError::from)?;
            let method_bytes = read_at(&caller, method_ptr, method_len)?;
            let name = c_string(&method_bytes);
            let alias_bytes = read_at(&caller, alias_ptr, alias_len)?;
            let alias = c_string(&alias_bytes);
            caller
                .data()
                .method_lookup
                .borrow_mut()
                .insert(alias, ForeignMethod { contract_address, name });
            Ok(0)
        },
    )?;

    Ok(())
}

/// Strips the trailing NUL a C-string argument carries.
fn c_string(bytes: &[u8]) -> String {
    let trimmed = if bytes.last() == Some(&0) {
        &bytes[..bytes.len() - 1]
    } else {
        bytes
    };
    String::from_utf8_lossy(trimmed).into_owned()
}

fn register_dynamic_imports<S: KeyValueStore + ?Sized + 'static>(
    linker: &mut Linker<HostCtx<S>>,
    module: &Module,
    header: &Header,
) -> Result<(), wasmi::Error> {
    for import in module.imports() {
        if import.module() == "wasi_unstable" {
            register_wasi_import(linker, import.name())?;
            continue;
        }
        if import.module() != "env" {
            continue;
        }
        let name = import.name().to_string();
        if is_fixed_env_import(&name) {
            continue;
        }
        let func_ty = match import.ty().func() {
            Some(ty) => ty.clone(),
            None => continue,
        };

        if let Some(event) = header.events.values().find(|e| e.name == name) {
            let event = event.clone();
            linker.func_new(
                "env",
                name.as_str(),
                func_ty,
                move |caller: Caller<'_, HostCtx<S>>, params: &[Val], results: &mut [Val]| {
                    let mut caller = caller;
                    let args: Vec<u64> = params.iter().map(|v| value_to_u64(*v)).collect();
                    let ret = handle_emit_event(&mut caller, &event, &args)?;
                    if let Some(slot) = results.first_mut() {
                        *slot = Val::I64(ret as i64);
                    }
                    Ok(())
                },
            )?;
            continue;
        }
        // Method aliases are only known once `chain_method_bind` runs, so a
        // single dispatcher is registered that looks the alias up at call
        // time rather than at link time.
        let alias = name.clone();
        linker.func_new(
            "env",
            name.as_str(),
            func_ty,
            move |caller: Caller<'_, HostCtx<S>>, params: &[Val], results: &mut [Val]| {
                let mut caller = caller;
                let args: Vec<u64> = params.iter().map(|v| value_to_u64(*v)).collect();
                let ret = handle_invoke_alias(&mut caller, &alias, &args)?;
                if let Some(slot) = results.first_mut() {
                    *slot = Val::I64(ret as i64);
                }
                Ok(())
            },
        )?;
    }
    Ok(())
}

fn register_wasi_import<S: KeyValueStore + ?Sized + 'static>(
    linker: &mut Linker<HostCtx<S>>,
    name: &str,
) -> Result<(), wasmi::Error> {
    match name {
        "proc_exit" => linker.func_wrap(
            "wasi_unstable",
            "proc_exit",
            |_caller: Caller<'_, HostCtx<S>>, code: u64| -> Result<u64, wasmi::Error> {
                wasi::proc_exit(&[code]).map_err(Into::into)
            },
        ),
        "proc_raise" => linker.func_wrap(
            "wasi_unstable",
            "proc_raise",
            |_caller: Caller<'_, HostCtx<S>>, code: u64| -> Result<u64, wasmi::Error> {
                wasi::proc_raise(&[code]).map_err(Into::into)
            },
        ),
        other => {
            let message = wasi::unsupported(other);
            linker.func_wrap(
                "wasi_unstable",
                other,
                move |_caller: Caller<'_, HostCtx<S>>| -> Result<u64, wasmi::Error> {
                    Err(VmError::Ignite(message.to_string()).into())
                },
            )
        }
    }
}

fn is_fixed_env_import(name: &str) -> bool {
    matches!(
        name,
        "chain_storage_set"
            | "chain_storage_get"
            | "chain_storage_size_get"
            | "chain_get_caller"
            | "chain_get_creator"
            | "chain_get_contract_address"
            | "chain_arg_size_get"
            | "chain_arg_size_set"
            | "chain_block_height"
            | "chain_block_time"
            | "chain_args_write"
            | "chain_args_hash"
            | "chain_ed25519_verify"
            | "chain_method_bind"
    )
}

fn handle_emit_event<S: KeyValueStore + ?Sized + 'static>(
    caller: &mut Caller<'_, HostCtx<S>>,
    event: &chain_abi::EventDecl,
    args: &[u64],
) -> Result<u64, wasmi::Error> {
    let mut mem_bytes = Vec::with_capacity(event.parameters.len());
    for (i, param) in event.parameters.iter().enumerate() {
        let raw = args.get(i).copied().unwrap_or(0);
        if param.ty.is_address() {
            let size = param.ty.memory_size() as i32;
            let value = read_at(caller, raw as i32, size)?;
            Address::from_bytes(&value).map_err(VmError::from)?;
            mem_bytes.push(value);
        } else if param.is_array {
            let ptr = raw as i32;
            let size = caller
                .data()
                .ptr_sizes
                .borrow()
                .get(&ptr)
                .copied()
                .ok_or(VmError::PointerSizeNotFound(ptr))?;
            mem_bytes.push(read_at(caller, ptr, size)?);
        } else {
            mem_bytes.push(raw.to_le_bytes().to_vec());
        }
    }

    let values = chain_abi::encode_from_bytes(&event.parameters, &mem_bytes).map_err(VmError::from)?;
    let cost = caller.data().policy.cost_for_event(values.len());
    charge(caller, cost)?;

    let pushed = Event {
        id: event.method_id(),
        args: values,
        contract: caller.data().address,
    };
    caller.data().events.borrow_mut().push(pushed);
    Ok(0)
}

fn handle_invoke_alias<S: KeyValueStore + ?Sized + 'static>(
    caller: &mut Caller<'_, HostCtx<S>>,
    alias: &str,
    args: &[u64],
) -> Result<u64, wasmi::Error> {
    let ctx_call_depth = caller.data().call_depth;
    let max_call_depth = caller.data().max_call_depth;
    if ctx_call_depth + 1 > max_call_depth {
        return Err(VmError::CallDepthExceeded.into());
    }

    let foreign_address = {
        let lookup = caller.data().method_lookup.borrow();
        let foreign = lookup
            .get(alias)
            .ok_or_else(|| VmError::Ignite(format!("no method bound to alias {alias}")))?;
        (foreign.contract_address, foreign.name.clone())
    };
    let (foreign_address, foreign_method_name) = foreign_address;

    let function = {
        let ctx = caller.data();
        let mut state = ctx.state.borrow_mut();
        let account = state
            .load_account(foreign_address)
            .map_err(VmError::from)?
            .ok_or_else(|| VmError::Ignite("foreign account not found".to_string()))?;
        let bytes = account
            .contract_bytes()
            .ok_or_else(|| VmError::Ignite("foreign account has no contract".to_string()))?;
        let contract = Contract::decode(bytes).map_err(VmError::from)?;
        contract
            .header
            .get_function(&foreign_method_name)
            .cloned()
            .ok_or_else(|| VmError::MethodNotFound(foreign_method_name.clone()))?
    };
    if function.parameters.len() != args.len() {
        return Err(VmError::Ignite("argument count mismatch".to_string()).into());
    }

    let mut values = Vec::with_capacity(args.len());
    for (i, param) in function.parameters.iter().enumerate() {
        let raw = args[i];
        let bytes = if param.is_array {
            let ptr = raw as i32;
            let size = caller
                .data()
                .ptr_sizes
                .borrow()
                .get(&ptr)
                .copied()
                .ok_or(VmError::PointerSizeNotFound(ptr))?;
            read_at(caller, ptr, size)?
        } else if param.ty.is_pointer() {
            let size = param.ty.memory_size() as i32;
            read_at(caller, raw as i32, size)?
        } else {
            let size = param.ty.memory_size();
            raw.to_le_bytes()[..size].to_vec()
        };
        values.push(bytes);
    }
    let method_args = chain_abi::encode_from_bytes(&function.parameters, &values).map_err(VmError::from)?;

    reconcile_fuel(caller)?;

    let child = {
        let ctx = caller.data();
        Engine {
            state: Rc::clone(&ctx.state),
            address: foreign_address,
            caller: ctx.address,
            policy: Rc::clone(&ctx.policy),
            gas: ctx.gas.clone(),
            events: Rc::clone(&ctx.events),
            call_depth: ctx.call_depth + 1,
            mem_aggr: ctx.mem_aggr,
            max_call_depth: ctx.max_call_depth,
            block_height: ctx.block_height,
            block_time: ctx.block_time,
        }
    };

    let result = child.ignite(&foreign_method_name, &method_args);
    resync_fuel(caller)?;
    result.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_abi::{Parameter, PrimitiveType};

    fn scalar(name: &str, ty: PrimitiveType) -> Parameter {
        Parameter::new(name, ty)
    }

    fn array(name: &str, ty: PrimitiveType) -> Parameter {
        Parameter::new_array(name, ty)
    }

    #[test]
    fn scalar_arguments_are_zero_padded_to_a_register() {
        let params = vec![scalar("n", PrimitiveType::Uint8)];
        let (args, writes) = marshal_arguments(&[vec![7u8]], &params, 1024).unwrap();
        assert_eq!(args, vec![7u64]);
        assert!(writes.is_empty());
    }

    #[test]
    fn array_arguments_are_written_to_scratch_memory_and_passed_as_pointers() {
        let params = vec![array("data", PrimitiveType::Uint8)];
        let bytes = vec![1u8, 2, 3, 4];
        let (args, writes) = marshal_arguments(&[bytes.clone()], &params, 1024).unwrap();
        assert_eq!(args, vec![1024u64]);
        assert_eq!(writes, vec![(1024, bytes)]);
    }

    #[test]
    fn successive_pointer_arguments_advance_the_scratch_offset() {
        let params = vec![
            array("a", PrimitiveType::Uint8),
            array("b", PrimitiveType::Uint8),
        ];
        let (args, writes) = marshal_arguments(
            &[vec![1, 2, 3], vec![4, 5]],
            &params,
            100,
        )
        .unwrap();
        assert_eq!(args, vec![100, 103]);
        assert_eq!(writes[0].0, 100);
        assert_eq!(writes[1].0, 103);
    }

    #[test]
    fn address_arguments_are_validated_before_marshalling() {
        let params = vec![scalar("who", PrimitiveType::Address)];
        let bad = vec![vec![1u8; 35]];
        assert!(marshal_arguments(&bad, &params, 0).is_err());
    }

    #[test]
    fn raw_to_val_picks_i64_only_for_eight_byte_scalars() {
        let eight_byte = scalar("amount", PrimitiveType::Uint64);
        let one_byte = scalar("flag", PrimitiveType::Uint8);
        let pointer = array("data", PrimitiveType::Uint8);
        assert!(matches!(raw_to_val(9, &eight_byte), Val::I64(9)));
        assert!(matches!(raw_to_val(9, &one_byte), Val::I32(9)));
        assert!(matches!(raw_to_val(256, &pointer), Val::I32(256)));
    }

    #[test]
    fn value_to_u64_round_trips_both_integer_widths() {
        assert_eq!(value_to_u64(Val::I64(-1)), u64::MAX);
        assert_eq!(value_to_u64(Val::I32(-1)), u32::MAX as u64);
    }

    #[test]
    fn c_string_strips_a_single_trailing_nul() {
        assert_eq!(c_string(b"transfer\0"), "transfer");
        assert_eq!(c_string(b"transfer"), "transfer");
    }

    #[test]
    fn is_fixed_env_import_recognizes_every_host_function() {
        for name in [
            "chain_storage_set",
            "chain_storage_get",
            "chain_storage_size_get",
            "chain_get_caller",
            "chain_get_creator",
            "chain_get_contract_address",
            "chain_arg_size_get",
            "chain_arg_size_set",
            "chain_block_height",
            "chain_block_time",
            "chain_args_write",
            "chain_args_hash",
            "chain_ed25519_verify",
            "chain_method_bind",
        ] {
            assert!(is_fixed_env_import(name), "{name} should be fixed");
        }
        assert!(!is_fixed_env_import("transfer"));
        assert!(!is_fixed_env_import("Transferred"));
    }
}
