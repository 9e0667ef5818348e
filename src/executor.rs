//! Device protocol handling and command execution

use std::{ io, time::Duration };
use tokio::io::{ AsyncWriteExt, AsyncReadExt };
use tracing::debug;
use crate::{
    cmd::CmdSet,
    error::{ Error, Result },
};

pub(crate) struct Executor<T>
{
    line_ending: &'static str,
    io_handle: T,
    read_buf: Vec<u8>,
    timeout: Duration,
}

impl <T> Executor<T>
    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    pub(crate) fn with(line_ending: &'static str, io_handle: T, timeout: Duration) -> Self
    {
        Self {
            line_ending: line_ending,
            io_handle: io_handle,
            read_buf: Vec::with_capacity(128),
            timeout: timeout,
        }
    }

    /// Drops the first `n` bytes from the read buffer
    ///
    /// Drops all bytes if `n >= self.read_buf.len()`
    fn drop_first(&mut self, n: usize)
    {
        if n >= self.read_buf.len() {
            self.read_buf.clear();
        }
        else {
            // relocate any bytes after the Nth byte to index 0
            self.read_buf.rotate_left(n);
            self.read_buf.truncate(self.read_buf.len() - n);
        }
    }

    /// Returns the index of the first linefeed in the read buffer, starting the search at the
    /// suggested index
    fn find_line_ending(&self, start_hint: usize) -> Option<usize>
    {
        self.read_buf
            .get(start_hint..)?
            .iter()
            .position(|byte| *byte == 0x0A)
            .map(|offset| start_hint + offset)
    }

    /// Reads a line (series of bytes terminated by `LF` / 0x0A) into the read buffer and returns
    /// how many bytes are in the line, terminator included
    ///
    /// # Cancel Safety
    /// This function is cancel safe, e.g. when raced against a timeout. It never destroys
    /// contents of the read buffer, only appends.
    async fn read_line(&mut self) -> io::Result<usize>
    {
        // try to find the ending in already-buffered data first
        let mut end_index = self.find_line_ending(0);

        while end_index.is_none() {
            let mut temp_buf = [0u8; 256];
            let prior_end = self.read_buf.len();
            let bytes_read = self.io_handle.read(&mut temp_buf[..]).await?;

            if bytes_read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Instrument closed the connection before completing a response",
                ));
            }

            self.read_buf.extend_from_slice(&temp_buf[..bytes_read]);
            end_index = self.find_line_ending(prior_end);
        }

        Ok(end_index.map_or(0, |index| index + 1))
    }

    async fn write_cmd(&mut self, cmd: &CmdSet) -> Result<()>
    {
        debug!(command = %cmd, "send");
        let serialized = format!("{}{}", cmd, self.line_ending);
        self.io_handle.write_all(serialized.as_bytes()).await?;
        self.io_handle.flush().await?;

        Ok(())
    }

    /// Takes `size` bytes off the front of the read buffer as a string, without the line ending
    fn get_string(&mut self, size: usize) -> Result<String>
    {
        let line = self.read_buf[..size]
            .strip_suffix(b"\n")
            .unwrap_or(&self.read_buf[..size]);
        let line = line.strip_suffix(b"\r").unwrap_or(line).to_vec();
        self.drop_first(size);

        Ok(String::from_utf8(line)?)
    }

    /// Sends a command which produces no response
    pub(crate) async fn exec_cmd(&mut self, cmd: &CmdSet) -> Result<()>
    {
        if cmd.is_query() {
            return Err(Error::CommandKind {
                command: cmd.to_string(),
                reason: "is a query and its response must be read",
            });
        }

        self.write_cmd(cmd).await
    }

    pub(crate) async fn exec_all(&mut self, cmds: &[CmdSet]) -> Result<()>
    {
        for cmd in cmds.iter() {
            self.exec_cmd(cmd).await?;
        }

        Ok(())
    }

    /// Sends a query and waits for its response line
    ///
    /// Fails with [`Error::Timeout`] when no complete line arrives within the executor's timeout.
    pub(crate) async fn query(&mut self, cmd: &CmdSet) -> Result<String>
    {
        if !cmd.is_query() {
            return Err(Error::CommandKind {
                command: cmd.to_string(),
                reason: "produces no response",
            });
        }

        self.write_cmd(cmd).await?;

        let response_len = tokio::time::timeout(self.timeout, self.read_line())
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;
        let response = self.get_string(response_len)?;
        debug!(command = %cmd, response = %truncate_for_log(&response), "receive");

        Ok(response)
    }

    pub(crate) async fn close(mut self) -> Result<()>
    {
        self.io_handle.shutdown().await?;
        Ok(())
    }
}

/// Long data responses are shortened so the debug log stays readable
fn truncate_for_log(response: &str) -> &str
{
    const LIMIT: usize = 120;

    match response.char_indices().nth(LIMIT) {
        Some((index, _)) => &response[..index],
        None => response,
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use tokio::io::{ duplex, AsyncBufReadExt, BufReader };

    #[tokio::test]
    async fn query_reads_one_line_at_a_time()
    {
        let (client, server) = duplex(1024);
        let mut executor = Executor::with("\n", client, Duration::from_secs(1));
        let (server_read, mut server_write) = tokio::io::split(server);

        server_write.write_all(b"first\r\nsecond\n").await.unwrap();

        assert_eq!(executor.query(&CmdSet::Identify).await.unwrap(), "first");
        assert_eq!(executor.query(&CmdSet::Options).await.unwrap(), "second");

        drop(executor);
        let mut lines = BufReader::new(server_read).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("*IDN?"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("*OPT?"));
    }

    #[tokio::test]
    async fn commands_are_line_terminated()
    {
        let (client, server) = duplex(1024);
        let mut executor = Executor::with("\n", client, Duration::from_secs(1));

        executor.exec_all(&[CmdSet::ClearStatus, CmdSet::BiasOutput(false)]).await.unwrap();
        executor.close().await.unwrap();

        let mut received = String::new();
        BufReader::new(server).read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "*CLS\n:SOUR:BIAS:STAT OFF\n");
    }

    #[tokio::test(start_paused = true)]
    async fn silent_instrument_times_out()
    {
        let (client, _server) = duplex(1024);
        let mut executor = Executor::with("\n", client, Duration::from_secs(15));

        let err = executor.query(&CmdSet::OperationComplete).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(timeout) if timeout == Duration::from_secs(15)));
    }

    #[tokio::test]
    async fn closed_connection_is_an_error()
    {
        let (client, server) = duplex(1024);
        let mut executor = Executor::with("\n", client, Duration::from_secs(1));
        drop(server);

        assert!(executor.query(&CmdSet::Identify).await.is_err());
    }

    #[tokio::test]
    async fn query_sent_as_command_is_refused()
    {
        let (client, server) = duplex(1024);
        let mut executor = Executor::with("\n", client, Duration::from_secs(1));

        let err = executor.exec_cmd(&CmdSet::Identify).await.unwrap_err();
        assert!(matches!(err, Error::CommandKind { ref command, .. } if command == "*IDN?"));

        let err = executor.exec_all(&[CmdSet::ClearStatus, CmdSet::OperationComplete]).await.unwrap_err();
        assert!(matches!(err, Error::CommandKind { ref command, .. } if command == "*OPC?"));

        let err = executor.query(&CmdSet::Preset).await.unwrap_err();
        assert!(matches!(err, Error::CommandKind { ref command, .. } if command == ":SYST:PRES"));

        executor.close().await.unwrap();
        let mut received = String::new();
        BufReader::new(server).read_to_string(&mut received).await.unwrap();
        assert_eq!(received, "*CLS\n");
    }
}
