//! Link-layer transport for EAPOL frames
//!
//! [`AfPacketSocket`] is the production transport: a raw `AF_PACKET`
//! socket bound to the PAE ethertype on one interface. [`ChannelLink`]
//! carries frames over tokio channels for tests and simulations.

use async_trait::async_trait;
use dot1x_proto::MacAddress;
use std::io;
use tokio::sync::{mpsc, Mutex};

/// A bidirectional frame transport
#[async_trait]
pub trait LinkSocket: Send + Sync {
    /// Receive one complete Ethernet frame
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Transmit one complete Ethernet frame
    async fn send(&self, frame: &[u8]) -> io::Result<usize>;

    /// Address of the local interface
    fn hardware_address(&self) -> MacAddress;
}

#[cfg(target_os = "linux")]
pub use af_packet::AfPacketSocket;

#[cfg(target_os = "linux")]
mod af_packet {
    use super::LinkSocket;
    use crate::error::AuthenticatorError;
    use async_trait::async_trait;
    use dot1x_proto::{eapol::ETH_P_PAE, MacAddress};
    use std::ffi::CString;
    use std::io;
    use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
    use tokio::io::unix::AsyncFd;
    use tracing::debug;

    /// Raw socket receiving EAPOL frames on one interface
    pub struct AfPacketSocket {
        async_fd: AsyncFd<OwnedFd>,
        ifindex: i32,
        hw_addr: MacAddress,
    }

    impl AfPacketSocket {
        /// Open a socket on `ifname` and join the PAE group address
        pub fn bind(ifname: &str) -> Result<Self, AuthenticatorError> {
            let fd = unsafe {
                libc::socket(
                    libc::AF_PACKET,
                    libc::SOCK_RAW,
                    ETH_P_PAE.to_be() as i32,
                )
            };
            if fd < 0 {
                return Err(AuthenticatorError::Io(io::Error::last_os_error()));
            }
            // closed on every early return below
            let fd = unsafe { OwnedFd::from_raw_fd(fd) };

            let (ifindex, hw_addr) = Self::setup(fd.as_raw_fd(), ifname)?;
            let async_fd = AsyncFd::new(fd)?;
            debug!(interface = ifname, ifindex, hw_addr = %hw_addr, "EAPOL socket bound");
            Ok(AfPacketSocket {
                async_fd,
                ifindex,
                hw_addr,
            })
        }

        fn setup(fd: RawFd, ifname: &str) -> Result<(i32, MacAddress), AuthenticatorError> {
            let mut ifr = Self::ifreq(ifname)?;

            if unsafe { libc::ioctl(fd, libc::SIOCGIFINDEX, &mut ifr) } < 0 {
                return Err(AuthenticatorError::InterfaceNotFound(ifname.to_string()));
            }
            let ifindex = unsafe { ifr.ifr_ifru.ifru_ifindex };

            if unsafe { libc::ioctl(fd, libc::SIOCGIFHWADDR, &mut ifr) } < 0 {
                return Err(AuthenticatorError::Io(io::Error::last_os_error()));
            }
            let sa_data = unsafe { ifr.ifr_ifru.ifru_hwaddr.sa_data };
            let mut hw = [0u8; 6];
            for (dst, src) in hw.iter_mut().zip(sa_data.iter()) {
                *dst = *src as u8;
            }

            let sockaddr = libc::sockaddr_ll {
                sll_family: libc::AF_PACKET as u16,
                sll_protocol: ETH_P_PAE.to_be(),
                sll_ifindex: ifindex,
                sll_hatype: 0,
                sll_pkttype: 0,
                sll_halen: 0,
                sll_addr: [0; 8],
            };
            let ret = unsafe {
                libc::bind(
                    fd,
                    &sockaddr as *const _ as *const libc::sockaddr,
                    std::mem::size_of::<libc::sockaddr_ll>() as u32,
                )
            };
            if ret < 0 {
                return Err(AuthenticatorError::Io(io::Error::last_os_error()));
            }

            let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
            if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
                return Err(AuthenticatorError::Io(io::Error::last_os_error()));
            }

            Self::join_pae_group(fd, ifindex)?;
            Ok((ifindex, MacAddress::new(hw)))
        }

        fn ifreq(ifname: &str) -> Result<libc::ifreq, AuthenticatorError> {
            let name = CString::new(ifname)
                .map_err(|_| AuthenticatorError::InterfaceNotFound(ifname.to_string()))?;
            let name_bytes = name.as_bytes_with_nul();

            let mut ifr: libc::ifreq = unsafe { std::mem::zeroed() };
            if name_bytes.len() > ifr.ifr_name.len() {
                return Err(AuthenticatorError::InterfaceNotFound(ifname.to_string()));
            }
            for (dst, src) in ifr.ifr_name.iter_mut().zip(name_bytes) {
                *dst = *src as libc::c_char;
            }
            Ok(ifr)
        }

        fn join_pae_group(fd: RawFd, ifindex: i32) -> Result<(), AuthenticatorError> {
            let mut address = [0u8; 8];
            address[..6].copy_from_slice(&MacAddress::PAE_GROUP.octets());
            let mreq = libc::packet_mreq {
                mr_ifindex: ifindex,
                mr_type: libc::PACKET_MR_MULTICAST as u16,
                mr_alen: 6,
                mr_address: address,
            };

            let ret = unsafe {
                libc::setsockopt(
                    fd,
                    libc::SOL_PACKET,
                    libc::PACKET_ADD_MEMBERSHIP,
                    &mreq as *const _ as *const libc::c_void,
                    std::mem::size_of::<libc::packet_mreq>() as u32,
                )
            };
            if ret < 0 {
                return Err(AuthenticatorError::Io(io::Error::last_os_error()));
            }
            Ok(())
        }

        pub fn ifindex(&self) -> i32 {
            self.ifindex
        }
    }

    #[async_trait]
    impl LinkSocket for AfPacketSocket {
        async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
            loop {
                let mut guard = self.async_fd.readable().await?;

                let result = guard.try_io(|inner| {
                    let fd = inner.get_ref().as_raw_fd();
                    let mut from: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
                    let mut from_len = std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t;
                    let n = unsafe {
                        libc::recvfrom(
                            fd,
                            buf.as_mut_ptr() as *mut _,
                            buf.len(),
                            0,
                            &mut from as *mut _ as *mut libc::sockaddr,
                            &mut from_len,
                        )
                    };
                    if n < 0 {
                        Err(io::Error::last_os_error())
                    } else {
                        Ok((n as usize, from.sll_pkttype))
                    }
                });

                match result {
                    // our own transmissions are looped back to packet sockets
                    Ok(Ok((_, pkttype))) if pkttype == libc::PACKET_OUTGOING as u8 => continue,
                    Ok(Ok((len, _))) => return Ok(len),
                    Ok(Err(e)) => return Err(e),
                    Err(_would_block) => continue,
                }
            }
        }

        async fn send(&self, frame: &[u8]) -> io::Result<usize> {
            loop {
                let mut guard = self.async_fd.writable().await?;

                match guard.try_io(|inner| {
                    let fd = inner.get_ref().as_raw_fd();
                    let n = unsafe { libc::send(fd, frame.as_ptr() as *const _, frame.len(), 0) };
                    if n < 0 {
                        Err(io::Error::last_os_error())
                    } else {
                        Ok(n as usize)
                    }
                }) {
                    Ok(result) => return result,
                    Err(_would_block) => continue,
                }
            }
        }

        fn hardware_address(&self) -> MacAddress {
            self.hw_addr
        }
    }

    impl AsRawFd for AfPacketSocket {
        fn as_raw_fd(&self) -> RawFd {
            self.async_fd.get_ref().as_raw_fd()
        }
    }
}

/// In-memory link carrying frames over channels
pub struct ChannelLink {
    inbound: Mutex<mpsc::Receiver<Vec<u8>>>,
    outbound: mpsc::Sender<Vec<u8>>,
    hw_addr: MacAddress,
}

/// The far end of a [`ChannelLink`]
pub struct LinkPeer {
    /// Frames written here are received by the link
    pub tx: mpsc::Sender<Vec<u8>>,
    /// Frames the link sends arrive here
    pub rx: mpsc::Receiver<Vec<u8>>,
}

impl ChannelLink {
    pub fn pair(hw_addr: MacAddress, capacity: usize) -> (ChannelLink, LinkPeer) {
        let (to_link, inbound) = mpsc::channel(capacity);
        let (outbound, from_link) = mpsc::channel(capacity);
        (
            ChannelLink {
                inbound: Mutex::new(inbound),
                outbound,
                hw_addr,
            },
            LinkPeer {
                tx: to_link,
                rx: from_link,
            },
        )
    }
}

#[async_trait]
impl LinkSocket for ChannelLink {
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let frame = self
            .inbound
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "link peer closed"))?;
        let len = frame.len().min(buf.len());
        buf[..len].copy_from_slice(&frame[..len]);
        Ok(len)
    }

    async fn send(&self, frame: &[u8]) -> io::Result<usize> {
        self.outbound
            .send(frame.to_vec())
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "link peer closed"))?;
        Ok(frame.len())
    }

    fn hardware_address(&self) -> MacAddress {
        self.hw_addr
    }
}
