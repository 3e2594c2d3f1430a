use bitcoincore_rpc::bitcoin::address::{Address, NetworkChecked};
use bitcoincore_rpc::bitcoin::{Network, Script, ScriptBuf};
use electrum_client::{ScriptHash, ToElectrumScriptHash};
use std::str::FromStr;

pub fn parse_address(address: &str, network: Network) -> Result<Address<NetworkChecked>, String> {
    let addr = Address::from_str(address)
        .map_err(|e| format!("Invalid address {}: {}", address, e))?;
    let addr = addr
        .require_network(network)
        .map_err(|e| format!("Address network mismatch for {}: {}", address, e))?;

    Ok(addr)
}

pub fn address_to_script(address: &str, network: Network) -> Result<ScriptBuf, String> {
    let addr = parse_address(address, network)?;
    Ok(addr.script_pubkey())
}

// Electrum indexes scripts by sha256 of the script bytes, shown reversed
pub fn script_to_electrum_hash(script: &Script) -> ScriptHash {
    script.to_electrum_scripthash()
}
