#![allow(dead_code)]

use energymeter::error::{MeterError, Result};
use energymeter::transport::RegisterTransport;
use std::collections::VecDeque;

/// Scripted reply for one read request
pub enum Reply {
    Words(Vec<u16>),
    Fail(&'static str),
    /// Fail and drop the session, as an I/O error would
    Disconnect(&'static str),
    /// Never answer, like a device that stopped responding mid-cycle
    Hang,
}

/// In-memory transport replaying scripted replies in order
#[derive(Default)]
pub struct ScriptedTransport {
    replies: VecDeque<Reply>,
    pub requests: Vec<(u16, u16)>,
    pub connected: bool,
    pub connects: u32,
    pub refuse_connect: bool,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: replies.into(),
            ..Default::default()
        }
    }

    pub fn connected(mut self) -> Self {
        self.connected = true;
        self
    }

    pub fn push(&mut self, reply: Reply) {
        self.replies.push_back(reply);
    }
}

#[async_trait::async_trait]
impl RegisterTransport for ScriptedTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connects += 1;
        if self.refuse_connect {
            return Err(MeterError::connection("connection refused"));
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn read(&mut self, start: u16, count: u16) -> Result<Vec<u16>> {
        self.requests.push((start, count));
        match self.replies.pop_front() {
            Some(Reply::Words(words)) => Ok(words),
            Some(Reply::Fail(msg)) => Err(MeterError::transport(msg)),
            Some(Reply::Disconnect(msg)) => {
                self.connected = false;
                Err(MeterError::transport(msg))
            }
            Some(Reply::Hang) => {
                std::future::pending::<()>().await;
                Err(MeterError::transport("unreachable reply"))
            }
            None => Err(MeterError::transport("no scripted reply")),
        }
    }
}

/// Words of a big-endian-word-order f32
pub fn f32_words(value: f32) -> [u16; 2] {
    let b = value.to_be_bytes();
    [
        ((b[0] as u16) << 8) | b[1] as u16,
        ((b[2] as u16) << 8) | b[3] as u16,
    ]
}
