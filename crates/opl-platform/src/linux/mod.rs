//! Linux TUN device
//!
//! Opens `/dev/net/tun` in `IFF_TUN | IFF_NO_PI` mode, assigns the address,
//! netmask and MTU, and brings the interface up. Needs `CAP_NET_ADMIN`.
//!
//! Routes and resolver settings are left to the system: the configured route
//! and DNS server are logged so the operator can apply them with `ip route`
//! and their resolver configuration.
//!
//! Reads poll the device together with a self-pipe, so a [`TunnelWaker`]
//! can interrupt a blocked read from another thread.

use crate::traits::{closed_error, TunnelDevice, TunnelProvider, TunnelWaker};
use crate::{PlatformError, Result};
use opl_core::config::TunnelConfig;
use std::io;
use std::net::Ipv4Addr;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use tracing::{debug, info, warn};

const TUN_PATH: &[u8] = b"/dev/net/tun\0";
const IFNAMSIZ: usize = 16;

const TUNSETIFF: libc::c_ulong = 0x4004_54ca;
const SIOCGIFFLAGS: libc::c_ulong = 0x8913;
const SIOCSIFFLAGS: libc::c_ulong = 0x8914;
const SIOCSIFADDR: libc::c_ulong = 0x8916;
const SIOCSIFNETMASK: libc::c_ulong = 0x891c;
const SIOCSIFMTU: libc::c_ulong = 0x8922;

const IFF_UP: libc::c_short = 0x0001;
const IFF_RUNNING: libc::c_short = 0x0040;
const IFF_TUN: libc::c_short = 0x0001;
const IFF_NO_PI: libc::c_short = 0x1000;

/// `struct ifreq`
#[repr(C)]
struct IfReq {
    name: [libc::c_char; IFNAMSIZ],
    data: IfReqData,
}

#[repr(C)]
#[derive(Clone, Copy)]
union IfReqData {
    flags: libc::c_short,
    mtu: libc::c_int,
    addr: libc::sockaddr_in,
    _pad: [u8; 24],
}

impl IfReq {
    fn new(name: &str) -> Result<Self> {
        if name.len() >= IFNAMSIZ || name.as_bytes().contains(&0) {
            return Err(PlatformError::Configure(format!(
                "invalid interface name '{name}'"
            )));
        }
        let mut req = Self {
            name: [0; IFNAMSIZ],
            data: IfReqData { _pad: [0; 24] },
        };
        for (dst, src) in req.name.iter_mut().zip(name.bytes()) {
            *dst = src as libc::c_char;
        }
        Ok(req)
    }

    fn name(&self) -> String {
        let bytes: Vec<u8> = self
            .name
            .iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8)
            .collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn ioctl(fd: RawFd, request: libc::c_ulong, req: &mut IfReq) -> io::Result<()> {
    // SAFETY: `req` is a fully initialized ifreq that outlives the call
    let ret = unsafe { libc::ioctl(fd, request as _, req as *mut IfReq) };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn sockaddr(addr: Ipv4Addr) -> libc::sockaddr_in {
    libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: 0,
        sin_addr: libc::in_addr {
            s_addr: u32::from_ne_bytes(addr.octets()),
        },
        sin_zero: [0; 8],
    }
}

fn netmask(prefix_len: u8) -> Ipv4Addr {
    match prefix_len {
        0 => Ipv4Addr::UNSPECIFIED,
        p => Ipv4Addr::from(u32::MAX << (32 - u32::from(p.min(32)))),
    }
}

fn open_error(e: io::Error) -> PlatformError {
    if e.kind() == io::ErrorKind::PermissionDenied {
        PlatformError::PermissionDenied(format!("{e} (CAP_NET_ADMIN is required)"))
    } else {
        PlatformError::DeviceOpen(e.to_string())
    }
}

fn open_tun() -> Result<OwnedFd> {
    // SAFETY: TUN_PATH is NUL-terminated
    let fd = unsafe { libc::open(TUN_PATH.as_ptr().cast(), libc::O_RDWR | libc::O_CLOEXEC) };
    if fd < 0 {
        return Err(open_error(io::Error::last_os_error()));
    }
    // SAFETY: fd was just opened and nothing else owns it
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn control_socket() -> Result<OwnedFd> {
    // SAFETY: plain socket(2) call
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM | libc::SOCK_CLOEXEC, 0) };
    if fd < 0 {
        return Err(PlatformError::Configure(format!(
            "control socket: {}",
            io::Error::last_os_error()
        )));
    }
    // SAFETY: fd was just created and nothing else owns it
    Ok(unsafe { OwnedFd::from_raw_fd(fd) })
}

fn wake_pipe() -> Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0 as RawFd; 2];
    // SAFETY: fds has room for the two descriptors pipe2 writes
    let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
    if ret < 0 {
        return Err(PlatformError::Io(io::Error::last_os_error()));
    }
    // SAFETY: both descriptors were just created and nothing else owns them
    Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
}

fn configure(name: &str, config: &TunnelConfig) -> Result<()> {
    let sock = control_socket()?;
    let fd = sock.as_raw_fd();
    let step = |what: &str, e: io::Error| PlatformError::Configure(format!("{what} on {name}: {e}"));

    let mut req = IfReq::new(name)?;
    req.data.addr = sockaddr(config.address);
    ioctl(fd, SIOCSIFADDR, &mut req).map_err(|e| step("set address", e))?;

    let mut req = IfReq::new(name)?;
    req.data.addr = sockaddr(netmask(config.prefix_len));
    ioctl(fd, SIOCSIFNETMASK, &mut req).map_err(|e| step("set netmask", e))?;

    let mut req = IfReq::new(name)?;
    req.data.mtu = libc::c_int::from(config.mtu);
    ioctl(fd, SIOCSIFMTU, &mut req).map_err(|e| step("set mtu", e))?;

    let mut req = IfReq::new(name)?;
    ioctl(fd, SIOCGIFFLAGS, &mut req).map_err(|e| step("get flags", e))?;
    // SAFETY: SIOCGIFFLAGS filled in the flags member
    let flags = unsafe { req.data.flags };
    req.data.flags = flags | IFF_UP | IFF_RUNNING;
    ioctl(fd, SIOCSIFFLAGS, &mut req).map_err(|e| step("bring up", e))?;

    Ok(())
}

/// Provider of Linux TUN devices
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxTunProvider;

impl LinuxTunProvider {
    /// Create the provider
    pub fn new() -> Self {
        Self
    }
}

impl TunnelProvider for LinuxTunProvider {
    fn name(&self) -> &str {
        "linux-tun"
    }

    fn establish(&self, config: &TunnelConfig) -> Result<Box<dyn TunnelDevice>> {
        let fd = open_tun()?;

        let mut req = IfReq::new(config.device_name.as_deref().unwrap_or(""))?;
        req.data.flags = IFF_TUN | IFF_NO_PI;
        ioctl(fd.as_raw_fd(), TUNSETIFF, &mut req).map_err(open_error)?;
        let name = req.name();

        configure(&name, config)?;
        let (wake_rd, wake_wr) = wake_pipe()?;

        info!(
            device = %name,
            address = %format!("{}/{}", config.address, config.prefix_len),
            mtu = config.mtu,
            "TUN device up"
        );
        info!(
            route = %format!("{}/{}", config.route, config.route_prefix_len),
            dns = %config.dns_server,
            "Route and resolver are not installed automatically"
        );

        Ok(Box::new(LinuxTunDevice {
            name,
            fd: Some(fd),
            wake_rd,
            waker: Arc::new(PipeWaker { wr: wake_wr }),
            timeout_ms: libc::c_int::try_from(config.read_timeout_ms).unwrap_or(libc::c_int::MAX),
        }))
    }
}

struct LinuxTunDevice {
    name: String,
    fd: Option<OwnedFd>,
    wake_rd: OwnedFd,
    waker: Arc<PipeWaker>,
    timeout_ms: libc::c_int,
}

impl LinuxTunDevice {
    fn drain_wake(&self) {
        let mut buf = [0u8; 64];
        loop {
            // SAFETY: buf is valid for buf.len() bytes; the pipe is non-blocking
            let n = unsafe {
                libc::read(self.wake_rd.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len())
            };
            if n <= 0 {
                break;
            }
        }
    }
}

impl TunnelDevice for LinuxTunDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_frame(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let fd = self.fd.as_ref().ok_or_else(closed_error)?.as_raw_fd();

        let mut fds = [
            libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: self.wake_rd.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            },
        ];
        // SAFETY: fds is a valid array of two pollfd entries
        let ready = unsafe { libc::poll(fds.as_mut_ptr(), 2, self.timeout_ms) };
        if ready < 0 {
            return Err(io::Error::last_os_error());
        }
        if ready == 0 {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        if fds[1].revents & libc::POLLIN != 0 {
            self.drain_wake();
            return Err(io::ErrorKind::Interrupted.into());
        }
        if fds[0].revents & libc::POLLIN == 0 {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("{} reported poll events {:#x}", self.name, fds[0].revents),
            ));
        }

        // SAFETY: buf is valid for writes of buf.len() bytes
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n.unsigned_abs())
        }
    }

    fn write_frame(&mut self, frame: &[u8]) -> io::Result<usize> {
        let fd = self.fd.as_ref().ok_or_else(closed_error)?.as_raw_fd();
        // SAFETY: frame is valid for reads of frame.len() bytes
        let n = unsafe { libc::write(fd, frame.as_ptr().cast(), frame.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n.unsigned_abs())
        }
    }

    fn waker(&self) -> Arc<dyn TunnelWaker> {
        self.waker.clone()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(fd) = self.fd.take() {
            drop(fd);
            debug!(device = %self.name, "TUN device closed");
        }
        Ok(())
    }
}

impl Drop for LinuxTunDevice {
    fn drop(&mut self) {
        if self.fd.is_some() {
            warn!(device = %self.name, "TUN device dropped without close");
        }
    }
}

struct PipeWaker {
    wr: OwnedFd,
}

impl TunnelWaker for PipeWaker {
    fn wake(&self) {
        let byte = 1u8;
        // SAFETY: writes one byte from a live local; a full pipe (EAGAIN)
        // already guarantees a pending wake-up
        unsafe {
            libc::write(self.wr.as_raw_fd(), (&byte as *const u8).cast(), 1);
        }
    }
}
