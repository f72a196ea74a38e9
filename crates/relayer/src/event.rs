//! Side-chain deposit log decoding.
//!
//! The bridge contract emits one log per deposit. The log `data` is a
//! binary frame carrying the bridge-assigned transfer index, the
//! destination chain selector, and the opaque relay payload. The payload
//! itself decodes to [`TxParams`], the structured cross-chain parameter
//! set the hub chain understands.
//!
//! All length-prefixed fields use the Bitcoin-style var-int encoding:
//! values below 0xfd are a single byte, then 0xfd/0xfe/0xff prefix a
//! little-endian u16/u32/u64.

use anyhow::anyhow;
use primitive_types::{
    H160,
    H256,
};

/// One deposit observed in a side-chain block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrossChainEvent {
    /// Contract that emitted the log.
    pub contract: H160,
    /// Transfer index assigned by the bridge contract.
    pub tx_id: Vec<u8>,
    /// Destination chain selector.
    pub to_chain_id: u64,
    /// Opaque payload relayed to the hub; decodes to [`TxParams`].
    pub payload: Vec<u8>,
    /// Side-chain native transaction hash carrying the deposit.
    pub tx_hash: H256,
}

impl CrossChainEvent {
    /// Decode the log `data` frame emitted by the bridge contract.
    pub fn decode(contract: H160, tx_hash: H256, data: &[u8]) -> anyhow::Result<Self> {
        let mut reader = Reader::new(data);
        let tx_id = reader.var_bytes()?;
        let to_chain_id = reader.u64_le()?;
        let payload = reader.var_bytes()?;
        reader.finish()?;
        Ok(Self {
            contract,
            tx_id,
            to_chain_id,
            payload,
            tx_hash,
        })
    }
}

/// Structured cross-chain parameter set carried in a deposit payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxParams {
    /// Transfer transaction hash as recorded by the bridge contract.
    pub source_tx_hash: Vec<u8>,
    /// Stable identifier naming this transfer intent; keys the hub's
    /// "done" marker.
    pub cross_chain_id: Vec<u8>,
    /// Side-chain proxy contract the deposit originated from.
    pub from_contract: Vec<u8>,
    /// Destination chain selector.
    pub to_chain_id: u64,
    /// Target contract on the destination chain.
    pub to_contract: Vec<u8>,
    /// Target contract method, checked against the whitelist.
    pub method: String,
    /// Method arguments, opaque to the relay.
    pub args: Vec<u8>,
}

impl TxParams {
    /// Decode a deposit payload.
    pub fn decode(payload: &[u8]) -> anyhow::Result<Self> {
        let mut reader = Reader::new(payload);
        let params = Self {
            source_tx_hash: reader.var_bytes()?,
            cross_chain_id: reader.var_bytes()?,
            from_contract: reader.var_bytes()?,
            to_chain_id: reader.u64_le()?,
            to_contract: reader.var_bytes()?,
            method: reader.var_str()?,
            args: reader.var_bytes()?,
        };
        reader.finish()?;
        Ok(params)
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> anyhow::Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| anyhow!("truncated field: need {n} bytes at offset {}", self.pos))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u64_le(&mut self) -> anyhow::Result<u64> {
        let raw = self.take(8)?;
        Ok(u64::from_le_bytes(raw.try_into().expect("8 bytes")))
    }

    fn var_uint(&mut self) -> anyhow::Result<u64> {
        let prefix = self.take(1)?[0];
        match prefix {
            0xfd => {
                let raw = self.take(2)?;
                Ok(u64::from(u16::from_le_bytes(raw.try_into().expect("2 bytes"))))
            }
            0xfe => {
                let raw = self.take(4)?;
                Ok(u64::from(u32::from_le_bytes(raw.try_into().expect("4 bytes"))))
            }
            0xff => self.u64_le(),
            byte => Ok(u64::from(byte)),
        }
    }

    fn var_bytes(&mut self) -> anyhow::Result<Vec<u8>> {
        let len = self.var_uint()?;
        let len = usize::try_from(len).map_err(|_| anyhow!("field length {len} overflows"))?;
        Ok(self.take(len)?.to_vec())
    }

    fn var_str(&mut self) -> anyhow::Result<String> {
        String::from_utf8(self.var_bytes()?).map_err(|err| anyhow!("field is not utf-8: {err}"))
    }

    fn finish(&self) -> anyhow::Result<()> {
        if self.pos != self.buf.len() {
            return Err(anyhow!(
                "{} trailing bytes after decoded frame",
                self.buf.len() - self.pos
            ));
        }
        Ok(())
    }
}
