pub mod sgs;
pub mod source;
pub mod yahoo;

#[cfg(test)]
mod stub_server;
