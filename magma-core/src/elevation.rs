//! SteamCMD and the server should not run as root; the CLI warns when they would.

#[cfg(windows)]
mod imp {
    use windows::Win32::{
        Foundation::{CloseHandle, HANDLE},
        Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY},
        System::Threading::{GetCurrentProcess, OpenProcessToken},
    };

    pub fn is_elevated() -> bool {
        unsafe {
            let mut token = HANDLE::default();
            if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token).is_err() {
                return false;
            }
            let mut elevation = TOKEN_ELEVATION::default();
            let mut ret_len = 0u32;
            let queried = GetTokenInformation(
                token,
                TokenElevation,
                Some(&mut elevation as *mut _ as _),
                std::mem::size_of::<TOKEN_ELEVATION>() as u32,
                &mut ret_len,
            );
            let _ = CloseHandle(token);
            queried.is_ok() && elevation.TokenIsElevated != 0
        }
    }
}

#[cfg(unix)]
mod imp {
    pub fn is_elevated() -> bool {
        nix::unistd::Uid::effective().is_root()
    }
}

pub use imp::is_elevated;

/// Message to print before running as an elevated user, if any.
pub fn elevation_warning() -> Option<&'static str> {
    if !is_elevated() {
        return None;
    }
    if cfg!(windows) {
        Some("Magma is running as Administrator. Files it creates may not be accessible to the server user.")
    } else {
        Some("Magma is running as root. Files it creates will be owned by root and the server may not be able to read them.")
    }
}
