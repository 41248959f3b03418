//! UDP 트랩 수신기
//!
//! 소켓 하나를 바인드하고 데이터그램을 하나씩 읽습니다.
//! 응답은 보내지 않습니다 (InformRequest 포함).

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::info;

use crate::error::TrapPipelineError;

/// 수신된 데이터그램 하나
#[derive(Debug, Clone)]
pub struct Datagram {
    /// 송신자 주소
    pub peer: SocketAddr,
    /// 데이터그램 바이트 (버퍼보다 길면 OS가 잘라냄)
    pub payload: Vec<u8>,
}

/// 바인드된 UDP 수신기
#[derive(Debug)]
pub struct TrapListener {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl TrapListener {
    /// 주소에 바인드합니다. 실패 시 처리 시작 전에 [`TrapPipelineError::Bind`]를 반환합니다.
    pub async fn bind(addr: SocketAddr, max_datagram_size: usize) -> Result<Self, TrapPipelineError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| TrapPipelineError::Bind {
                addr: addr.to_string(),
                source: e,
            })?;

        let listener = Self {
            socket,
            buf: vec![0u8; max_datagram_size],
        };
        info!(
            addr = %listener.local_addr().unwrap_or(addr),
            buffer = max_datagram_size,
            "trap listener bound"
        );
        Ok(listener)
    }

    /// 실제 바인드된 주소 (포트 0 바인드 시 할당된 포트 확인용)
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// 데이터그램 하나를 기다립니다. 타임아웃은 없습니다.
    pub async fn recv(&mut self) -> std::io::Result<Datagram> {
        let (len, peer) = self.socket.recv_from(&mut self.buf).await?;
        Ok(Datagram {
            peer,
            payload: self.buf[..len].to_vec(),
        })
    }
}
