//! Real Windows speech backend via SAPI COM interfaces.
//!
//! On Windows, wraps `ISpRecognizer`/`ISpRecoContext`/`ISpRecoGrammar` from
//! `Win32.Media.Speech`, mapping each call's HRESULT to a `SpeechError` at
//! the call site. The process-wide COM apartment is a refcounted guard held
//! by every live recognizer and by transient token lookups.
//!
//! On non-Windows platforms the type exists but every operation returns
//! `E_NOTIMPL`; use [`crate::MockPlatform`] there.

#[cfg(not(target_os = "windows"))]
use tracing::warn;

#[cfg(not(target_os = "windows"))]
use hark_core::error::{codes, ErrorKind, Result, SpeechError};
#[cfg(not(target_os = "windows"))]
use hark_core::types::{EngineDescriptor, EngineScope};

#[cfg(not(target_os = "windows"))]
use crate::{RecognizerHandle, SpeechPlatform};

/// Registry paths of the SAPI token categories the backend uses.
#[cfg(target_os = "windows")]
const CATEGORY_RECOGNIZERS: &str = r"HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Speech\Recognizers";
#[cfg(target_os = "windows")]
const CATEGORY_AUDIO_IN: &str = r"HKEY_LOCAL_MACHINE\SOFTWARE\Microsoft\Speech\AudioInput";

/// Speech platform backed by Microsoft SAPI.
#[derive(Debug, Default)]
pub struct SapiPlatform;

impl SapiPlatform {
    /// Create a new SAPI platform handle. Cheap; the COM apartment is only
    /// initialized once a recognizer or token lookup needs it.
    pub fn new() -> Self {
        Self
    }
}

// =============================================================================
// Windows implementation
// =============================================================================

#[cfg(target_os = "windows")]
mod imp {
    use std::sync::Mutex;

    use tracing::debug;
    use windows::core::{Interface, HSTRING, PCWSTR};
    use windows::Win32::Foundation::LPARAM;
    use windows::Win32::Media::Speech::{
        ISpObjectToken, ISpObjectTokenCategory, ISpRecoContext, ISpRecoGrammar, ISpRecognizer,
        SpInprocRecognizer, SpObjectToken, SpObjectTokenCategory, SpSharedRecognizer, SPEVENT,
        SPLO_STATIC, SPRS_ACTIVE, SPRS_INACTIVE, SPRST_ACTIVE, SPRST_INACTIVE,
    };
    use windows::Win32::System::Com::{
        CoCreateInstance, CoInitializeEx, CoTaskMemFree, CoUninitialize, CLSCTX_ALL,
        COINIT_MULTITHREADED,
    };

    use hark_core::error::{codes, ErrorKind, Result, SpeechError};
    use hark_core::types::{EngineDescriptor, EngineScope, EventRecord, InterestSet, RecoState};

    use crate::{ContextHandle, GrammarHandle, RecognizerHandle};

    use super::{SapiPlatform, CATEGORY_AUDIO_IN, CATEGORY_RECOGNIZERS};

    /// The two reserved bits SAPI requires set in every interest mask.
    const SPFEI_FLAGCHECK: u64 = (1 << 30) | (1 << 33);

    /// `SPEVENT.lParam` payload tags that own memory or a COM reference.
    const SPET_LPARAM_IS_TOKEN: u32 = 1;
    const SPET_LPARAM_IS_OBJECT: u32 = 2;
    const SPET_LPARAM_IS_POINTER: u32 = 3;
    const SPET_LPARAM_IS_STRING: u32 = 4;

    fn native(kind: ErrorKind, err: windows::core::Error) -> SpeechError {
        SpeechError::new(kind, err.code().0)
    }

    // =========================================================================
    // COM apartment
    // =========================================================================

    static APARTMENT_REFS: Mutex<usize> = Mutex::new(0);

    /// Refcounted guard for the process-wide COM apartment.
    ///
    /// The first acquire initializes COM, the last release uninitializes
    /// it. Every recognizer holds one for its lifetime, so uninitialization
    /// always happens after the last engine handle is released.
    pub(super) struct ComApartment;

    impl ComApartment {
        pub(super) fn acquire() -> Result<Self> {
            let mut refs = APARTMENT_REFS.lock().expect("apartment refcount poisoned");
            if *refs == 0 {
                unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) }
                    .ok()
                    .map_err(|e| native(ErrorKind::PlatformInitFailed, e))?;
            }
            *refs += 1;
            Ok(Self)
        }
    }

    impl Drop for ComApartment {
        fn drop(&mut self) {
            let mut refs = APARTMENT_REFS.lock().expect("apartment refcount poisoned");
            *refs -= 1;
            if *refs == 0 {
                unsafe { CoUninitialize() };
            }
        }
    }

    // =========================================================================
    // Token helpers
    // =========================================================================

    fn open_category(id: &str) -> windows::core::Result<ISpObjectTokenCategory> {
        let category: ISpObjectTokenCategory =
            unsafe { CoCreateInstance(&SpObjectTokenCategory, None, CLSCTX_ALL)? };
        unsafe { category.SetId(&HSTRING::from(id), false)? };
        Ok(category)
    }

    /// Read a token's default string value (its display name).
    fn token_display_name(token: &ISpObjectToken) -> windows::core::Result<String> {
        let value = unsafe { token.GetStringValue(PCWSTR::null())? };
        let name = String::from_utf16_lossy(unsafe { value.as_wide() });
        unsafe { CoTaskMemFree(Some(value.0 as *const _)) };
        Ok(name)
    }

    /// The default token of a category (used for the audio-input device).
    fn default_token(category_id: &str) -> windows::core::Result<ISpObjectToken> {
        let category = open_category(category_id)?;
        let id = unsafe { category.GetDefaultTokenId()? };
        let token: ISpObjectToken =
            unsafe { CoCreateInstance(&SpObjectToken, None, CLSCTX_ALL)? };
        let bound = unsafe { token.SetId(PCWSTR::null(), PCWSTR(id.0), false) };
        unsafe { CoTaskMemFree(Some(id.0 as *const _)) };
        bound?;
        Ok(token)
    }

    /// Best-matching recognizer token for a display name, via a
    /// `Name=<name>` attribute filter on the recognizer category.
    fn find_engine_token(name: &str) -> Result<ISpObjectToken> {
        let attributes = HSTRING::from(format!("Name={name}"));
        let category = open_category(CATEGORY_RECOGNIZERS)
            .map_err(|e| native(ErrorKind::EngineLookupFailed, e))?;
        let tokens = unsafe { category.EnumTokens(&attributes, PCWSTR::null()) }
            .map_err(|e| native(ErrorKind::EngineLookupFailed, e))?;

        let mut token: Option<ISpObjectToken> = None;
        let mut fetched = 0u32;
        unsafe { tokens.Next(1, &mut token, Some(&mut fetched)) }
            .map_err(|e| native(ErrorKind::EngineLookupFailed, e))?;
        match token {
            Some(token) if fetched == 1 => Ok(token),
            _ => Err(SpeechError::new(
                ErrorKind::EngineLookupFailed,
                codes::SPERR_NOT_FOUND,
            )),
        }
    }

    // =========================================================================
    // Platform
    // =========================================================================

    impl crate::SpeechPlatform for SapiPlatform {
        fn name(&self) -> &str {
            "sapi"
        }

        fn create_recognizer(&self, scope: EngineScope) -> Result<Box<dyn RecognizerHandle>> {
            let apartment = ComApartment::acquire()?;
            let clsid = match scope {
                EngineScope::InProcess => &SpInprocRecognizer,
                EngineScope::Shared => &SpSharedRecognizer,
            };
            let recognizer: ISpRecognizer = unsafe { CoCreateInstance(clsid, None, CLSCTX_ALL) }
                .map_err(|e| native(ErrorKind::EngineCreationFailed, e))?;
            debug!(scope = ?scope, "SAPI recognizer created");
            Ok(Box::new(SapiRecognizer {
                recognizer,
                _apartment: apartment,
            }))
        }

        fn resolve_engine(&self, name: &str) -> Result<EngineDescriptor> {
            let _apartment = ComApartment::acquire()?;
            let token = find_engine_token(name)?;
            let display = token_display_name(&token)
                .map_err(|e| native(ErrorKind::EngineNameUnavailable, e))?;
            Ok(EngineDescriptor::new(display))
        }

        fn list_engines(&self) -> Result<Vec<String>> {
            let _apartment = ComApartment::acquire()?;
            let category = open_category(CATEGORY_RECOGNIZERS)
                .map_err(|e| native(ErrorKind::EngineLookupFailed, e))?;
            let tokens = unsafe { category.EnumTokens(PCWSTR::null(), PCWSTR::null()) }
                .map_err(|e| native(ErrorKind::EngineLookupFailed, e))?;
            let count = unsafe { tokens.GetCount() }
                .map_err(|e| native(ErrorKind::EngineLookupFailed, e))?;

            let mut names = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let mut token: Option<ISpObjectToken> = None;
                unsafe { tokens.Next(1, &mut token, None) }
                    .map_err(|e| native(ErrorKind::EngineLookupFailed, e))?;
                let Some(token) = token else { break };
                names.push(
                    token_display_name(&token)
                        .map_err(|e| native(ErrorKind::EngineNameUnavailable, e))?,
                );
            }
            Ok(names)
        }
    }

    // =========================================================================
    // Recognizer
    // =========================================================================

    /// The apartment guard is the last field so COM outlives the interface.
    struct SapiRecognizer {
        recognizer: ISpRecognizer,
        _apartment: ComApartment,
    }

    impl RecognizerHandle for SapiRecognizer {
        fn bind_default_input(&mut self) -> Result<()> {
            let token = default_token(CATEGORY_AUDIO_IN)
                .map_err(|e| native(ErrorKind::AudioInputBindingFailed, e))?;
            unsafe { self.recognizer.SetInput(&token, true) }
                .map_err(|e| native(ErrorKind::AudioInputBindingFailed, e))
        }

        fn create_context(&mut self) -> Result<Box<dyn ContextHandle>> {
            let context = unsafe { self.recognizer.CreateRecoContext() }
                .map_err(|e| native(ErrorKind::ContextCreationFailed, e))?;
            Ok(Box::new(SapiContext { context }))
        }

        fn switch_engine(&mut self, engine: &EngineDescriptor) -> Result<()> {
            let token = find_engine_token(&engine.name)?;
            unsafe { self.recognizer.SetRecognizer(&token) }
                .map_err(|e| native(ErrorKind::EngineSwitchFailed, e))
        }

        fn engine_name(&self) -> Result<String> {
            let token = unsafe { self.recognizer.GetRecognizer() }
                .map_err(|e| native(ErrorKind::EngineLookupFailed, e))?;
            token_display_name(&token).map_err(|e| native(ErrorKind::EngineNameUnavailable, e))
        }

        fn state(&self) -> Result<u32> {
            let state = unsafe { self.recognizer.GetRecoState() }
                .map_err(|e| native(ErrorKind::StateQueryFailed, e))?;
            Ok(state.0 as u32)
        }

        fn set_state(&mut self, state: RecoState) -> Result<()> {
            let native_state = match state {
                RecoState::Active => SPRST_ACTIVE,
                RecoState::Inactive => SPRST_INACTIVE,
                _ => return Err(SpeechError::invalid_arg(ErrorKind::ActivationFailed)),
            };
            unsafe { self.recognizer.SetRecoState(native_state) }
                .map_err(|e| native(ErrorKind::ActivationFailed, e))
        }
    }

    // =========================================================================
    // Context
    // =========================================================================

    struct SapiContext {
        context: ISpRecoContext,
    }

    impl ContextHandle for SapiContext {
        fn set_interest(&mut self, interest: InterestSet) -> Result<()> {
            let mask = interest.mask() | SPFEI_FLAGCHECK;
            unsafe { self.context.SetInterest(mask, mask) }
                .map_err(|e| native(ErrorKind::InterestConfigurationFailed, e))
        }

        fn arm_notification(&mut self) -> Result<()> {
            unsafe { self.context.SetNotifyWin32Event() }
                .map_err(|e| native(ErrorKind::NotificationWiringFailed, e))
        }

        fn pause(&mut self) -> Result<()> {
            unsafe { self.context.Pause(0) }.map_err(|e| native(ErrorKind::PauseFailed, e))
        }

        fn resume(&mut self) -> Result<()> {
            unsafe { self.context.Resume(0) }.map_err(|e| native(ErrorKind::ResumeFailed, e))
        }

        fn create_grammar(&mut self) -> Result<Box<dyn GrammarHandle>> {
            let grammar = unsafe { self.context.CreateGrammar(0) }
                .map_err(|e| native(ErrorKind::GrammarCreationFailed, e))?;
            Ok(Box::new(SapiGrammar { grammar }))
        }

        fn drain(&mut self, max_count: u32) -> Result<Vec<EventRecord>> {
            let mut raw = vec![SPEVENT::default(); max_count as usize];
            let mut fetched = 0u32;
            unsafe {
                self.context
                    .GetEvents(max_count, raw.as_mut_ptr(), &mut fetched)
            }
            .map_err(|e| native(ErrorKind::EventRetrievalFailed, e))?;

            let mut records = Vec::with_capacity(fetched as usize);
            for event in raw.iter_mut().take(fetched as usize) {
                records.push(record_from_event(event));
                release_event_payload(event);
            }
            Ok(records)
        }
    }

    /// `SPEVENT` packs the event id and payload tag into one 32-bit
    /// bitfield: id in the low word, tag in the high word.
    fn record_from_event(event: &SPEVENT) -> EventRecord {
        let packed = event._bitfield as u32;
        EventRecord {
            event_id: packed & 0xFFFF,
            param_kind: packed >> 16,
            stream_num: event.ulStreamNum,
            stream_offset: event.ullAudioStreamOffset,
            wparam: event.wParam.0 as u64,
            lparam: event.lParam.0 as i64,
        }
    }

    /// Release whatever the event's `lParam` owns. Tokens and objects hold
    /// a COM reference; pointers and strings hold task memory.
    fn release_event_payload(event: &mut SPEVENT) {
        let tag = (event._bitfield as u32) >> 16;
        let lparam = event.lParam.0;
        if lparam == 0 {
            return;
        }
        match tag {
            SPET_LPARAM_IS_TOKEN | SPET_LPARAM_IS_OBJECT => unsafe {
                drop(windows::core::IUnknown::from_raw(lparam as *mut _));
            },
            SPET_LPARAM_IS_POINTER | SPET_LPARAM_IS_STRING => unsafe {
                CoTaskMemFree(Some(lparam as *const _));
            },
            _ => {}
        }
        event.lParam = LPARAM(0);
    }

    // =========================================================================
    // Grammar
    // =========================================================================

    struct SapiGrammar {
        grammar: ISpRecoGrammar,
    }

    impl GrammarHandle for SapiGrammar {
        fn load_dictation(&mut self) -> Result<()> {
            unsafe { self.grammar.LoadDictation(PCWSTR::null(), SPLO_STATIC) }
                .map_err(|e| native(ErrorKind::DictationActivationFailed, e))
        }

        fn set_dictation_active(&mut self, active: bool) -> Result<()> {
            let state = if active { SPRS_ACTIVE } else { SPRS_INACTIVE };
            unsafe { self.grammar.SetDictationState(state) }
                .map_err(|e| native(ErrorKind::DictationActivationFailed, e))
        }
    }
}

// =============================================================================
// Non-Windows stub
// =============================================================================

#[cfg(not(target_os = "windows"))]
impl SpeechPlatform for SapiPlatform {
    fn name(&self) -> &str {
        "sapi"
    }

    fn create_recognizer(&self, _scope: EngineScope) -> Result<Box<dyn RecognizerHandle>> {
        warn!("SapiPlatform called on a non-Windows platform");
        Err(SpeechError::new(
            ErrorKind::EngineCreationFailed,
            codes::E_NOTIMPL,
        ))
    }

    fn resolve_engine(&self, _name: &str) -> Result<EngineDescriptor> {
        Err(SpeechError::new(
            ErrorKind::EngineLookupFailed,
            codes::E_NOTIMPL,
        ))
    }

    fn list_engines(&self) -> Result<Vec<String>> {
        Err(SpeechError::new(
            ErrorKind::EngineLookupFailed,
            codes::E_NOTIMPL,
        ))
    }
}
