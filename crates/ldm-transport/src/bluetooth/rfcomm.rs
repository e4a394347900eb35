//! BlueZ RFCOMM socket 封装

use crate::{BluetoothAddress, TransportError};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::sys::socket::{MsgFlags, recv, send};
use std::io;
use std::mem;
use std::os::fd::{AsFd, AsRawFd, FromRawFd, OwnedFd};
use std::time::Duration;

const AF_BLUETOOTH: libc::c_int = 31;
const BTPROTO_RFCOMM: libc::c_int = 3;

/// `struct sockaddr_rc`（<bluetooth/rfcomm.h>）
#[repr(C)]
struct SockaddrRc {
    rc_family: libc::sa_family_t,
    /// 小端序（与书写顺序相反）
    rc_bdaddr: [u8; 6],
    rc_channel: u8,
}

/// 已连接的 RFCOMM socket，`OwnedFd` 保证所有退出路径都会关闭
pub(super) struct RfcommSocket {
    fd: OwnedFd,
}

impl RfcommSocket {
    pub(super) fn connect(address: BluetoothAddress, channel: u8) -> io::Result<Self> {
        let raw = unsafe {
            libc::socket(
                AF_BLUETOOTH,
                libc::SOCK_STREAM | libc::SOCK_CLOEXEC,
                BTPROTO_RFCOMM,
            )
        };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: raw 是刚创建的 fd，所有权转移给 OwnedFd
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let mut bdaddr = address.0;
        bdaddr.reverse();
        let addr = SockaddrRc {
            rc_family: AF_BLUETOOTH as libc::sa_family_t,
            rc_bdaddr: bdaddr,
            rc_channel: channel,
        };

        let ret = unsafe {
            libc::connect(
                fd.as_raw_fd(),
                &addr as *const SockaddrRc as *const libc::sockaddr,
                mem::size_of::<SockaddrRc>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self { fd })
    }

    pub(super) fn send_all(&self, mut bytes: &[u8]) -> Result<(), TransportError> {
        while !bytes.is_empty() {
            match send(self.fd.as_raw_fd(), bytes, MsgFlags::MSG_NOSIGNAL) {
                Ok(0) => return Err(TransportError::Disconnected),
                Ok(n) => bytes = &bytes[n..],
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(TransportError::Io(io::Error::from(e))),
            }
        }
        Ok(())
    }

    /// 有界阻塞读取：超时返回 `TransportError::Timeout`，对端关闭返回 `Disconnected`
    pub(super) fn recv_timeout(
        &self,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        let timeout_ms = timeout.as_millis().min(u128::from(u16::MAX)) as u16;
        let mut fds = [PollFd::new(self.fd.as_fd(), PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(timeout_ms)) {
            Ok(0) => return Err(TransportError::Timeout),
            Ok(_) => {},
            Err(Errno::EINTR) => return Err(TransportError::Timeout),
            Err(e) => return Err(TransportError::Io(io::Error::from(e))),
        }

        match recv(self.fd.as_raw_fd(), buf, MsgFlags::empty()) {
            Ok(0) => Err(TransportError::Disconnected),
            Ok(n) => Ok(n),
            Err(Errno::EAGAIN | Errno::EINTR) => Err(TransportError::Timeout),
            Err(e) => Err(TransportError::Io(io::Error::from(e))),
        }
    }
}
