mod errors;
mod gate;
mod handshake;
